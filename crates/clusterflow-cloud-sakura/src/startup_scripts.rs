//! Startup scripts attached to new servers
//!
//! Install statements render to `runurl` lines, so every startup script first
//! installs the `runurl` helper and then runs the rendered statements.

/// Installs `/usr/bin/runurl`, which downloads a script and runs it with args
pub const RUNURL_SETUP: &str = r#"#!/bin/bash
set -e

cat > /usr/bin/runurl <<'RUNURL'
#!/bin/bash
# runurl URL [ARG ...]
set -e
url=$1
shift
script=$(mktemp /tmp/runurl.XXXXXX)
trap 'rm -f "$script"' EXIT
wget --tries=5 --quiet --output-document="$script" "$url" || curl -fsSL --retry 5 -o "$script" "$url"
chmod +x "$script"
"$script" "$@"
RUNURL
chmod +x /usr/bin/runurl
"#;

/// Note name for a template's startup script
pub fn script_name(cluster: &str, roles: &[String]) -> String {
    format!("clusterflow-{}-{}", cluster, roles.join("-"))
}

/// Full startup script: the `runurl` helper followed by `body`
///
/// The `@sacloud-once` header keeps the script from running again on reboot.
pub fn startup_script(name: &str, body: &str) -> String {
    let setup = RUNURL_SETUP.trim_start_matches("#!/bin/bash\n");
    format!(
        "#!/bin/bash\n# @sacloud-name \"{}\"\n# @sacloud-once\n{}\n{}",
        name, setup, body
    )
}
