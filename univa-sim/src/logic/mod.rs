pub mod policy;
pub mod reports;
pub mod simulation;
pub mod tester;

pub use policy::{GameplayStrategy, PlayerPolicy, PolicyTurn};
pub use simulation::{EventCounts, SimulationPlan, SimulationSession, SimulationSummary};
pub use tester::*;
