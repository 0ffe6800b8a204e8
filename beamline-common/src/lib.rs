pub mod catalog;
pub mod config;
pub mod defaults;
pub mod distribution;
pub mod error;
pub mod gate;
pub mod import;
pub mod inputs;
pub mod lattice;
pub mod record;
pub mod schema;
pub mod serializer;
pub mod session;
pub mod simulation;
pub mod space_charge;
pub mod validator;
pub mod value;

// Re-export key types for easier use by dependent crates
pub use config::SessionConfig;
pub use defaults::Section;
pub use distribution::{DistributionInputType, DistributionSection};
pub use error::{CoercionError, EngineError, ImportError};
pub use gate::{ValidityReport, LATTICE_EMPTY};
pub use inputs::{InputField, InputParameters, KinEnergyUnit};
pub use lattice::Lattice;
pub use record::{ElementInstance, ParameterRecord};
pub use serializer::ConstructorCall;
pub use session::{Event, Outcome, Session, IMPORT_FAILED};
pub use simulation::{run_simulation, script_lines, SimulationBackend, SimulationOutput, SimulationRequest};
pub use space_charge::{Axis, GridField, PoissonSolver, SpaceCharge};
pub use validator::{validate, Condition};
pub use value::{DeclaredType, Value};
