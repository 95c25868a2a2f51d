pub mod bar;
pub mod outcome;
pub mod raw;
pub mod request;
pub mod series;
pub mod symbol;
