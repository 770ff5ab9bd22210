mod config;
mod replay;
