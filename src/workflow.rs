//! The correlation run: parent call, tagged child, grandchild, entity create.
//!
//! ```text
//! POST {env}api/data/v9.0/{api}                 stage 1        -> T1
//! POST {env}api/data/v9.0/{api}?tag=T1          stage 2        -> T2
//! POST {env}api/data/v9.0/{api}                 stage 3, T2    -> T3
//! POST {env}api/data/v9.0/{entity}?tag=T3       entity record  -> printed
//! ```
//!
//! Any failed call aborts the rest of the run.
use crate::cli::RootArgs;
use crate::config::{load_config, Config};
use crate::http::{post_data, EntityRecord, HttpPoster, Poster, TelemetryEvent};
use crate::token::{default_locator, parse_shell, AzCliTokenSource, StaticToken, TokenSource};
use anyhow::Result;
use std::io::{self, Write};

const EVENT_SOURCE: &str = "Sample";
const EVENT_LEVEL: &str = "Information";

/// Values gathered along the chain, in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TraceChain {
    pub(crate) parent: Option<String>,
    pub(crate) child: Option<String>,
    pub(crate) grandchild: Option<String>,
    pub(crate) entity_response: Option<String>,
}

impl TraceChain {
    /// The TraceParent the entity call is tagged with.
    pub(crate) fn last_trace_parent(&self) -> Option<&str> {
        self.grandchild.as_deref()
    }
}

/// Entry point for `dvtrace`.
pub fn run(args: &RootArgs) -> Result<()> {
    let config = load_config(&args.config)?.with_overrides(args);
    config.ensure_environment_url()?;

    let source: Box<dyn TokenSource> = match &args.token {
        Some(token) => Box::new(StaticToken(token.clone())),
        None => {
            let shell = parse_shell(&args.shell)?;
            Box::new(AzCliTokenSource::new(default_locator(&shell), shell))
        }
    };
    let token = source.access_token(&config.environment_url)?;

    let poster = HttpPoster::new(token.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let chain = run_trace_chain(&config, &token, &poster, &mut out)?;
    tracing::info!(
        parent = ?chain.parent,
        child = ?chain.child,
        grandchild = ?chain.grandchild,
        entity_created = chain.entity_response.is_some(),
        "trace chain complete"
    );
    Ok(())
}

/// Issue the chained calls, printing each value as it arrives.
pub(crate) fn run_trace_chain<P, W>(
    config: &Config,
    token: &str,
    poster: &P,
    out: &mut W,
) -> Result<TraceChain>
where
    P: Poster + ?Sized,
    W: Write,
{
    let mut chain = TraceChain::default();

    if !config.custom_api_name.is_empty() && !token.is_empty() {
        writeln!(out, "Custom API Name: {}", config.custom_api_name)?;
        let api_url = config.api_url(&config.custom_api_name);

        let parent_event = TelemetryEvent::new(EVENT_SOURCE, "1", EVENT_LEVEL, "Some data");
        let parent = post_data(poster, &api_url, None, &parent_event)?;
        writeln!(out, "TraceParent: {parent}")?;

        let child_event = TelemetryEvent::new(EVENT_SOURCE, "2", EVENT_LEVEL, "Some more data");
        let child = post_data(poster, &api_url, Some(&parent), &child_event)?;
        writeln!(out, "TraceParent (Child - Via Tag): {child}")?;

        let grandchild_event =
            TelemetryEvent::new(EVENT_SOURCE, "3", EVENT_LEVEL, "Some further data")
                .with_trace_parent(child.clone());
        let grandchild = post_data(poster, &api_url, None, &grandchild_event)?;
        writeln!(
            out,
            "TraceParent (Grandchild via Custom API Message): {grandchild}"
        )?;

        chain.parent = Some(parent);
        chain.child = Some(child);
        chain.grandchild = Some(grandchild);
    } else {
        tracing::debug!(
            has_custom_api = !config.custom_api_name.is_empty(),
            has_token = !token.is_empty(),
            "skipping custom API calls"
        );
    }

    let tag = chain
        .last_trace_parent()
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    match tag {
        Some(tag) if !config.entity_name.is_empty() && !token.is_empty() => {
            writeln!(out, "Entity Name: {}", config.entity_name)?;
            let record = EntityRecord {
                name: format!("Test {}", config.entity_name),
                description: "Sample data".to_string(),
            };
            let entity_url = config.api_url(&config.entity_name);
            let response = post_data(poster, &entity_url, Some(&tag), &record)?;
            writeln!(out, "{response}")?;
            chain.entity_response = Some(response);
        }
        _ => tracing::debug!("skipping entity create"),
    }

    Ok(chain)
}
