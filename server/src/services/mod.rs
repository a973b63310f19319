//! Background services for the FlightSurety backend

pub mod oracle_pool;
