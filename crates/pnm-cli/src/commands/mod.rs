pub mod graph;
pub mod inspect;
pub mod sensitivity;
pub mod util;
