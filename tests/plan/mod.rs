mod detailed_exitcode;
mod missing_plugins;
