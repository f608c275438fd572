mod calculation;
mod common;
mod submission;
