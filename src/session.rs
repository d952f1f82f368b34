//! Editor-integration session.
//!
//! A [`Session`] ties a [`ConfigResolver`] to the active target selection.
//! Each reload re-validates the selection, falling back to the first public
//! target and configuration, persists it to the hand-off file read by the
//! command line tool, and refreshes the IDE hint file.

use crate::config::{BuildConfig, ConfigResolver, Selection, SubscriptionId, handoff};
use crate::hasher::WorkspaceHasher;
use crate::hints::{self, HintOptions};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Label and selection offered to a target picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionItem {
    /// `target > config`.
    pub label: String,
    /// Names behind the label.
    pub selection: Selection,
}

/// Active target selection for one workspace.
#[derive(Debug)]
pub struct Session {
    resolver: ConfigResolver,
    temp_dir: Utf8PathBuf,
    hints: HintOptions,
    selection: Mutex<Option<Selection>>,
}

impl Session {
    /// Create a session around `resolver`, keeping hand-off files in
    /// `temp_dir`.
    #[must_use]
    pub fn new(resolver: ConfigResolver, temp_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            resolver,
            temp_dir: temp_dir.into(),
            hints: HintOptions::default(),
            selection: Mutex::new(None),
        }
    }

    /// Replace the hint generation options.
    #[must_use]
    pub fn with_hint_options(mut self, hints: HintOptions) -> Self {
        self.hints = hints;
        self
    }

    /// Resolver backing this session.
    #[must_use]
    pub const fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Location of the hand-off file for this workspace.
    #[must_use]
    pub fn handoff_path(&self) -> Utf8PathBuf {
        WorkspaceHasher::handoff_file(&self.temp_dir, self.resolver.workspace_root())
    }

    /// Currently selected target and configuration.
    #[must_use]
    pub fn selection(&self) -> Option<Selection> {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reload the configuration and re-validate the selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the hand-off or hint file cannot be written.
    pub fn reload(&self) -> Result<Arc<BuildConfig>> {
        let config = self.resolver.load();
        let current = self.selection();
        let still_valid = current
            .as_ref()
            .is_some_and(|sel| config.has_configuration(&sel.target, &sel.config, true));
        if still_valid {
            self.refresh_hints(&config, current.as_ref())?;
        } else {
            let fallback = default_selection(&config);
            debug!(?fallback, "selection reset after reload");
            self.set_target(fallback)?;
        }
        Ok(config)
    }

    /// Make `selection` active, persist it to the hand-off file and refresh
    /// the hint file. `None` clears the selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the hand-off or hint file cannot be written.
    pub fn set_target(&self, selection: Option<Selection>) -> Result<()> {
        let changed = {
            let mut current = self.selection.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != selection;
            current.clone_from(&selection);
            changed
        };
        if changed {
            let path = self.handoff_path();
            handoff::write(&path, selection.as_ref())
                .with_context(|| format!("failed to record selection in {path}"))?;
            match &selection {
                Some(sel) => info!(build_target = %sel.target, config = %sel.config, "selected"),
                None => info!("selection cleared"),
            }
        }
        self.refresh_hints(&self.resolver.snapshot(), selection.as_ref())
    }

    /// Every public `target > config` pair, in declaration order.
    #[must_use]
    pub fn selections(&self) -> Vec<SelectionItem> {
        let config = self.resolver.snapshot();
        config
            .target_names(true)
            .into_iter()
            .flat_map(|target| {
                config
                    .configuration_names(target, true)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |name| SelectionItem {
                        label: format!("{target} > {name}"),
                        selection: Selection::new(target, name),
                    })
            })
            .collect()
    }

    /// Register `listener` to run after every reload.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<BuildConfig>) + Send + Sync + 'static,
    {
        self.resolver.subscribe(listener)
    }

    /// Remove a listener registered with [`Session::subscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.resolver.unsubscribe(id)
    }

    fn refresh_hints(&self, config: &BuildConfig, selection: Option<&Selection>) -> Result<()> {
        hints::write(
            self.resolver.config_path(),
            config,
            selection,
            self.resolver.workspace_root(),
            &self.hints,
        )?;
        Ok(())
    }
}

/// First public configuration of the first public target that has one.
fn default_selection(config: &BuildConfig) -> Option<Selection> {
    let target = config.target_names(true).into_iter().next()?;
    let name = config.configuration_names(target, true)?.into_iter().next()?;
    Some(Selection::new(target, name))
}
