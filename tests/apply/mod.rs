mod approval;
mod destroy;
mod saved_plan;
