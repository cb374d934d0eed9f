// src/cluster/script.rs

//! Job script generation.
//!
//! Commands are embedded verbatim: no quoting, escaping or trimming. A
//! script run directly does exactly what its command says.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::cluster::layout::SchedulerLayout;
use crate::dag::{JobPayload, JobRef};
use crate::errors::{JobDagError, Result};

pub const INTERPRETER_DIRECTIVE: &str = "#!/bin/sh";

/// Grid Engine reads `#$` lines as embedded submission options.
pub const SHELL_DIRECTIVE: &str = "#$ -S /bin/bash";

/// Environment variable carrying the 1-based array task number.
pub const TASK_ID_VAR: &str = "SGE_TASK_ID";

/// Script text following the directives.
pub fn script_body(payload: &JobPayload) -> String {
    match payload {
        JobPayload::Single(cmd) => cmd.clone(),
        JobPayload::Grouped { commands } => {
            let mut body = format!("case \"${TASK_ID_VAR}\" in\n");
            for (i, cmd) in commands.iter().enumerate() {
                body.push_str(&format!("{})\n{}\n;;\n", i + 1, cmd));
            }
            body.push_str(&format!(
                "*)\necho \"no command for task ${TASK_ID_VAR}\" >&2\nexit 1\n;;\nesac"
            ));
            body
        }
    }
}

pub fn render_script(payload: &JobPayload) -> String {
    format!(
        "{INTERPRETER_DIRECTIVE}\n{SHELL_DIRECTIVE}\n{}\n",
        script_body(payload)
    )
}

/// Write each job's script into its directory and record the path on the job.
pub fn write_job_scripts(layout: &SchedulerLayout, jobs: &[JobRef]) -> Result<()> {
    for job in jobs {
        let path = layout.script_path(job);
        write_script(&path, &render_script(job.payload()))?;
        job.set_script_path(&path);
        debug!(job = %job.name(), script = ?path, "wrote job script");
    }
    Ok(())
}

fn write_script(path: &Path, contents: &str) -> Result<()> {
    let wrap = |source| JobDagError::ScriptWrite {
        path: path.to_path_buf(),
        source,
    };

    fs::write(path, contents).map_err(wrap)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(wrap)?;
    }

    Ok(())
}
