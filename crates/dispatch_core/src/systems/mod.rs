pub mod presence_refresh;
pub mod rematch;
pub mod ride_timeout;
