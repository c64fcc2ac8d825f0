// dbpull/src/commands/mod.rs
//! Builds the shell text for every external command the pull workflow runs.
//!
//! Nothing in here performs I/O. Each builder validates its settings first and
//! returns an error before producing any text, so an unsupported adapter never
//! yields a half-built command.

pub(crate) mod shell;

pub use shell::CommandLine;
use shell::{quote, Invocation};

use crate::config::ApplicationProfile;
use crate::credentials::{Adapter, AdapterSettings, DbSection};
use crate::errors::{AppError, Result};

/// Drops (if present) and recreates the local database.
pub fn build_recreate(local: &DbSection) -> Result<CommandLine> {
    let local = AdapterSettings::from_section(local)?;

    let command = match local.adapter {
        Adapter::Mysql => {
            let name = mysql_identifier(&local.database);
            let sql = format!(
                "DROP DATABASE IF EXISTS {name}; CREATE DATABASE IF NOT EXISTS {name};"
            );
            mysql_client("mysql", &local)
                .arg("-v")
                .arg("-e")
                .arg(sql)
                .into_command_line()
        }
        Adapter::Postgresql => {
            let drop = pg_client("dropdb", &local)
                .arg("--if-exists")
                .arg(&local.database);
            let create = pg_client("createdb", &local).arg(&local.database);
            CommandLine::from_parts(
                format!("{} && {}", drop.render(), create.render()),
                format!("{} && {}", drop.render_redacted(), create.render_redacted()),
            )
        }
    };

    Ok(command)
}

/// Streams a compressed dump of the server database into the local one.
///
/// The dump is produced and gzipped on the server, decompressed locally and
/// piped straight into the restore tool; it never touches the disk.
pub fn build_sync(
    remote: &DbSection,
    local: &DbSection,
    profile: &ApplicationProfile,
    restore_role: &str,
) -> Result<CommandLine> {
    let remote = AdapterSettings::from_section(remote)?;
    let local = AdapterSettings::from_section(local)?;

    if remote.adapter != local.adapter {
        return Err(AppError::AdapterMismatch {
            local: local.adapter.to_string(),
            remote: remote.adapter.to_string(),
        });
    }

    let (dump, restore) = match remote.adapter {
        Adapter::Mysql => {
            let dump = mysql_client("mysqldump", &remote)
                .args(["--opt", "-C"])
                .arg(&remote.database);
            let restore = mysql_client("mysql", &local).arg("-C").arg(&local.database);
            (dump, restore)
        }
        Adapter::Postgresql => {
            let dump = pg_client("pg_dump", &remote).arg("-Fc").arg(&remote.database);
            let restore = pg_client("pg_restore", &local)
                .arg("-d")
                .arg(&local.database)
                .arg("--no-owner")
                .arg(format!("--role={}", restore_role));
            (dump, restore)
        }
    };

    let pipeline = |dump: String, restore: String| {
        let remote_script = format!("{} | gzip -9 -c", dump);
        format!(
            "{} | gunzip -c | {}",
            ssh_invocation(profile, &remote_script),
            restore
        )
    };

    Ok(CommandLine::from_parts(
        pipeline(dump.render(), restore.render()),
        pipeline(dump.render_redacted(), restore.render_redacted()),
    ))
}

/// Prints a file from the server.
pub fn build_remote_read(profile: &ApplicationProfile, remote_file: &str) -> CommandLine {
    let script = format!("cat {}", quote(remote_file));
    CommandLine::raw(ssh_invocation(profile, &script))
}

/// Prints the `KEY=...` lines of a secrets file on the server.
///
/// `key` must already be a plain identifier; it is embedded in a regex.
pub fn build_secret_lookup(profile: &ApplicationProfile, remote_file: &str, key: &str) -> CommandLine {
    let pattern = format!("^(export[[:space:]]+)?{}=", key);
    let script = format!("grep -E {} {}", quote(&pattern), quote(remote_file));
    CommandLine::raw(ssh_invocation(profile, &script))
}

/// Local client tools the sync and recreate commands depend on.
pub fn required_tools(local: &DbSection) -> Result<Vec<&'static str>> {
    let adapter = AdapterSettings::from_section(local)?.adapter;
    let mut tools = vec!["ssh", "gunzip"];
    match adapter {
        Adapter::Mysql => tools.push("mysql"),
        Adapter::Postgresql => tools.extend(["dropdb", "createdb", "pg_restore"]),
    }
    Ok(tools)
}

fn ssh_invocation(profile: &ApplicationProfile, remote_script: &str) -> String {
    format!("ssh {} {}", quote(&profile.ssh_target()), quote(remote_script))
}

fn mysql_client(program: &str, settings: &AdapterSettings) -> Invocation {
    let mut inv = Invocation::new(program).arg("-h").arg(&settings.host);
    if let Some(port) = settings.port {
        inv = inv.arg("-P").arg(port.to_string());
    }
    inv = inv.arg("-u").arg(&settings.username);
    if let Some(password) = &settings.password {
        inv = inv.secret_arg("-p", password);
    }
    inv
}

fn pg_client(program: &str, settings: &AdapterSettings) -> Invocation {
    let mut inv = Invocation::new(program);
    if let Some(password) = &settings.password {
        inv = inv.secret_env("PGPASSWORD", password);
    }
    inv = inv.arg("-h").arg(&settings.host);
    if let Some(port) = settings.port {
        inv = inv.arg("-p").arg(port.to_string());
    }
    inv.arg("-U").arg(&settings.username)
}

fn mysql_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
