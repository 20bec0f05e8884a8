use color_eyre::Result;
use tradelog_core::storage::StorageBackend;
use tradelog_settings::{Settings, SettingsPatch, SettingsService};

use crate::{
    cli::{SettingsArgs, SettingsCommand},
    config::Config,
    storage,
};

/// Execute a settings subcommand against the durable store.
pub fn handle(cmd: SettingsCommand, config: &Config) -> Result<()> {
    let service = SettingsService::new(storage::secure_storage(config)?);
    let settings = apply(&service, cmd);
    print_settings(&settings);
    Ok(())
}

fn apply<B: StorageBackend>(service: &SettingsService<B>, cmd: SettingsCommand) -> Settings {
    match cmd {
        SettingsCommand::Show => {}
        SettingsCommand::Set(args) => {
            let patch = patch_from_args(args);
            if patch.is_empty() {
                println!("Nothing to update; pass at least one field.");
            } else {
                service.update(patch);
            }
        }
    }
    service.get()
}

fn patch_from_args(args: SettingsArgs) -> SettingsPatch {
    SettingsPatch {
        primary_text: args.primary_text,
        primary_color: args.primary_color,
        secondary_text: args.secondary_text,
        secondary_color: args.secondary_color,
    }
}

fn print_settings(settings: &Settings) {
    println!(
        "primary:   {} ({})",
        settings.primary_text, settings.primary_color
    );
    println!(
        "secondary: {} ({})",
        settings.secondary_text, settings.secondary_color
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_show_from_a_new_process() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let first = SettingsService::new(storage::secure_storage(&config).expect("storage"));
        let updated = apply(
            &first,
            SettingsCommand::Set(SettingsArgs {
                primary_color: Some("text-blue-500".into()),
                ..SettingsArgs::default()
            }),
        );
        assert_eq!(updated.primary_color, "text-blue-500");

        let second = SettingsService::new(storage::secure_storage(&config).expect("storage"));
        let shown = apply(&second, SettingsCommand::Show);
        assert_eq!(shown, updated);
        assert_eq!(shown.primary_text, "Cute");
    }

    #[test]
    fn empty_set_changes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let service = SettingsService::new(storage::test_storage(dir.path()));
        let settings = apply(&service, SettingsCommand::Set(SettingsArgs::default()));

        assert_eq!(settings, Settings::default());
        assert!(!service_has_record(dir.path()));
    }

    fn service_has_record(root: &std::path::Path) -> bool {
        storage::test_storage(root).has_item(tradelog_settings::SETTINGS_KEY)
    }
}
