pub mod kale;

pub use kale::KaleContract;
