pub mod game_service;
pub mod lobby_service;
pub mod night_actions;
pub mod role_assignment;
pub mod voting;
pub mod win_check;
