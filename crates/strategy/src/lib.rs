pub mod alert;
pub mod indicator;
pub mod region;
pub mod runner;
pub mod timeframe;
pub mod trader;
