pub mod callback_table;
pub mod capture;
pub mod correlator;
pub mod error;
