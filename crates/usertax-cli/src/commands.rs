//! Command execution.

use std::sync::Arc;

use tracing::info;
use usertax_core::{
    Actor, NewTerm, StorageConfig, TableConfig, TaxonomyDef, TaxonomyRegistry, TermQuery,
};
use usertax_sync::{
    BulkAction, FieldSettingsPatch, FieldType, PostedValue, SortDirection, SyncConfig,
    UserTaxonomies,
};

use crate::error::CliError;
use crate::formatter::{create_formatter, Formatter};
use crate::{Args, Command};

/// Open the store described by `args` and run its command.
pub fn run(args: &Args) -> Result<String, CliError> {
    let json = std::fs::read_to_string(&args.taxonomies)?;
    let registry = Arc::new(TaxonomyRegistry::new());
    for taxonomy in TaxonomyDef::list_from_json(&json)? {
        registry.register(taxonomy);
    }

    let storage = StorageConfig::new(&args.data)
        .with_tables(TableConfig::new(args.prefix.clone(), args.blog_id));
    let config = if args.no_sync {
        SyncConfig::disabled()
    } else {
        SyncConfig::default()
    };

    info!(data = %args.data.display(), blog_id = args.blog_id, "opening store");
    let directory = UserTaxonomies::open(storage, registry, config)?;
    let formatter = create_formatter(args.format);

    let output = execute(&directory, &args.command, formatter.as_ref())?;
    directory.engine().flush()?;
    Ok(output)
}

/// Run one command against an open store.
pub fn execute(
    directory: &UserTaxonomies,
    command: &Command,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    match command {
        Command::Recount { taxonomy } => {
            let terms = directory.recount(taxonomy)?;
            Ok(formatter.format_message(&format!(
                "Recounted {terms} term(s) in '{taxonomy}'"
            )))
        }

        Command::Terms { taxonomy, tree } => {
            if *tree {
                return Ok(formatter.format_tree(&directory.term_tree(taxonomy)?));
            }
            let terms = directory
                .terms()
                .with_user_scope(|terms| terms.get_terms(taxonomy, &TermQuery::all()))?;
            Ok(formatter.format_terms(&terms))
        }

        Command::AddTerm {
            taxonomy,
            name,
            slug,
            parent,
        } => {
            let mut term = NewTerm::new(name.as_str()).with_parent(*parent);
            if let Some(slug) = slug {
                term = term.with_slug(slug.as_str());
            }
            let term = directory.terms().insert_term(taxonomy, term)?;
            Ok(formatter.format_terms(std::slice::from_ref(&term)))
        }

        Command::AddUser { user_id, login } => {
            directory.register_user(*user_id, login)?;
            Ok(formatter.format_message(&format!("Registered user {user_id} ({login})")))
        }

        Command::SetTerms {
            user_id,
            taxonomy,
            slugs,
        } => {
            directory.set_user_terms(*user_id, slugs, taxonomy, false, true)?;
            Ok(formatter.format_terms(&directory.get_user_terms(*user_id, taxonomy)?))
        }

        Command::UserTerms { user_id, taxonomy } => {
            Ok(formatter.format_terms(&directory.get_user_terms(*user_id, taxonomy)?))
        }

        Command::Bulk {
            taxonomy,
            action,
            user_ids,
        } => {
            let parsed: BulkAction = action.parse()?;
            let report = directory.bulk_edit(&Actor::admin(), user_ids, taxonomy, &parsed)?;
            Ok(formatter.format_bulk(&parsed.to_string(), &report))
        }

        Command::AddField {
            name,
            taxonomy,
            multiple,
            sync,
        } => {
            let field = directory.create_field(name, FieldType::Taxonomy, SortDirection::Asc)?;
            let patch = FieldSettingsPatch {
                taxonomy: Some(taxonomy.clone()),
                multiple: Some(*multiple),
                sync_terms: Some(*sync),
                sync_to_profile: Some(*sync),
                ..Default::default()
            };
            directory.save_field_settings(field.id, &patch)?;
            Ok(formatter.format_message(&format!(
                "Created field {} ('{name}') for '{taxonomy}'",
                field.id
            )))
        }

        Command::SetField {
            field_id,
            user_id,
            slugs,
        } => {
            directory.save_field_value(*field_id, *user_id, &PostedValue::Many(slugs.clone()))?;
            let stored = directory.profiles().get_value(*field_id, *user_id)?;
            let slugs: Vec<String> = stored
                .map(|value| value.slug_set().into_iter().collect())
                .unwrap_or_default();
            Ok(formatter.format_message(&format!(
                "Field {field_id} for user {user_id}: [{}]",
                slugs.join(", ")
            )))
        }

        Command::Backfill { field_id } => {
            let report = directory.backfill_field(*field_id)?;
            Ok(formatter.format_backfill(&report))
        }
    }
}
