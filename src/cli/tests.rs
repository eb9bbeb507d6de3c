//! Tests for argument parsing and the state file

use super::*;
use crate::schema::ResourceData;
use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

// ============================================================================
// Addresses
// ============================================================================

#[test]
fn test_address_parse() {
    let address: Address = "databricks_sql_query.revenue".parse().unwrap();
    assert_eq!(address.resource, "databricks_sql_query");
    assert_eq!(address.name, "revenue");
    assert_eq!(address.to_string(), "databricks_sql_query.revenue");
}

#[test_case("databricks_sql_query" ; "no name")]
#[test_case(".revenue" ; "no type")]
#[test_case("databricks_sql_query." ; "empty name")]
fn test_address_invalid(raw: &str) {
    assert!(raw.parse::<Address>().is_err());
}

// ============================================================================
// Argument parsing
// ============================================================================

#[test]
fn test_parse_apply() {
    let cli = Cli::parse_from([
        "dbx-provider",
        "--state",
        "prod.json",
        "apply",
        "databricks_ip_access_list.office",
        "-r",
        "office.yaml",
    ]);
    assert_eq!(cli.state.to_str(), Some("prod.json"));
    assert!(!cli.verbose);
    match cli.command {
        Commands::Apply {
            address,
            resource_config,
        } => {
            assert_eq!(address.name, "office");
            assert_eq!(resource_config.to_str(), Some("office.yaml"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "dbx-provider",
        "import",
        "databricks_permissions.cluster",
        "/clusters/abc",
        "--verbose",
        "--format",
        "pretty",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.format, OutputFormat::Pretty);
    assert_eq!(cli.state.to_str(), Some("dbx-state.json"));
}

#[test]
fn test_parse_rejects_bad_address() {
    assert!(Cli::try_parse_from(["dbx-provider", "destroy", "no-dot"]).is_err());
}

// ============================================================================
// State file
// ============================================================================

#[test]
fn test_state_file_missing_is_empty() {
    let dir = tempdir().unwrap();
    let state = StateFile::from_file(dir.path().join("absent.json")).unwrap();
    assert!(state.resources.is_empty());
    assert_eq!(state.version, 1);
}

#[tokio::test]
async fn test_state_file_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut data = ResourceData::with_id("234567");
    data.set("label", "office");
    let mut state = StateFile::default();
    state.put("databricks_ip_access_list.office", data.clone());
    state.save(&path).await.unwrap();

    let loaded = StateFile::from_file(&path).unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.get("databricks_ip_access_list.office"), Some(&data));
    assert!(!dir.path().join("state.tmp").exists());
}

#[test]
fn test_state_file_drops_cleared_instances() {
    let mut state = StateFile::default();
    state.put("databricks_sql_query.q", ResourceData::with_id("q-1"));
    state.put("databricks_sql_query.q", ResourceData::new());
    assert!(state.get("databricks_sql_query.q").is_none());
}

#[test]
fn test_state_file_rejects_newer_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"version": 9, "resources": {}}"#).unwrap();
    assert!(StateFile::from_file(&path).is_err());
}
