pub mod remote_solver;

pub use remote_solver::{RemoteSolver, SolveRequest};
