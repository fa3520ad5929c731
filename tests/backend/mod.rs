mod plan_backend;
mod resolution;
