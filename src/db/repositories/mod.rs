mod players;
mod sessions;
