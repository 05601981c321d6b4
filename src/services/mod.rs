//! Business logic services for the Storefront Backend

pub mod reservation;
pub mod stock;

pub use reservation::ReservationService;
pub use stock::StockService;
