pub mod csv_data_adapter;
pub mod file_config_adapter;
pub mod sim_venue_adapter;
