pub mod barber;
pub mod location;
pub mod tracking;
