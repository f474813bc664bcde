//! Linear-system backends for the sensitivity engine.
//!
//! Every backend follows the same factorize-then-solve contract:
//!
//! 1. [`LinearSystemBackend::factorize`] takes a square sparse operator and
//!    returns an opaque [`Factorization`];
//! 2. [`Factorization::solve`] applies the inverse to a dense block of
//!    right-hand sides;
//! 3. dropping the factorization releases it, on every exit path.
//!
//! | Identifier      | Backend                  | Notes |
//! |-----------------|--------------------------|-------|
//! | `sparse-direct` | [`SparseLuSolver`]       | default, scales to large grids |
//! | `dense`         | [`DenseLuSolver`]        | small or poorly sparse systems |
//! | `alt-direct`    | [`SparseCholeskySolver`] | SPD operators only |

pub mod backend;
pub mod registry;

pub use backend::{
    DenseLuSolver, Factorization, LinearSystemBackend, SolverError, SparseCholeskySolver,
    SparseLuSolver,
};
pub use registry::LinearSolverKind;
