pub mod destinations;
pub mod users;
