pub mod db;
pub mod upstream;
