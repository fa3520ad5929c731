mod contention;
mod disabled;
mod interrupted;
mod release;
