pub mod status_controller;
