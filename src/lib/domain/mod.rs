pub mod leaf;
pub mod merge;
pub mod proof;
pub mod round;
pub mod wire;
