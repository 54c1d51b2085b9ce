use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use insight_client::{Outcome, ReviewSession};
use insight_core::{ActionStatus, NewAction, RemediationAction};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand tree
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ActionsSubcommand {
    /// List actions, newest proposal first
    List {
        /// Only show actions in this status
        #[arg(long)]
        status: Option<ActionStatus>,
    },

    /// Show one action with its result or error
    Show { id: String },

    /// Approve a proposed action
    Approve {
        id: String,
        /// Reviewer recorded as approved_by
        #[arg(long, env = "INSIGHT_REVIEWER", default_value = "user")]
        by: String,
    },

    /// Reject a proposed action
    Reject {
        id: String,
        /// Reviewer recorded as approved_by
        #[arg(long, env = "INSIGHT_REVIEWER", default_value = "user")]
        by: String,
    },

    /// Record a proposed action in the local store
    Propose {
        /// Originating finding id
        #[arg(long)]
        finding: String,

        /// close_jira_tickets | restart_pods | scale_deployment
        #[arg(long = "type")]
        action_type: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// Executor parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcommand: ActionsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        ActionsSubcommand::List { status } => super::block_on(list(root, status, json)),
        ActionsSubcommand::Show { id } => super::block_on(show(root, &id, json)),
        ActionsSubcommand::Approve { id, by } => {
            super::block_on(review(root, &id, &by, Verb::Approve, json))
        }
        ActionsSubcommand::Reject { id, by } => {
            super::block_on(review(root, &id, &by, Verb::Reject, json))
        }
        ActionsSubcommand::Propose {
            finding,
            action_type,
            title,
            description,
            params,
        } => propose(
            root,
            NewAction {
                finding_id: finding,
                action_type,
                title,
                description,
                params: serde_json::from_str(&params)
                    .map_err(|e| anyhow::anyhow!("--params is not valid JSON: {e}"))?,
            },
            json,
        ),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

async fn list(root: &Path, status: Option<ActionStatus>, json: bool) -> anyhow::Result<()> {
    let api = super::api_client(root)?;
    let actions = api.list_actions(status).await?;

    if json {
        return print_json(&actions);
    }
    if actions.is_empty() {
        println!("No actions.");
        return Ok(());
    }
    let rows = actions
        .iter()
        .map(|a| {
            vec![
                a.id.clone(),
                a.status.to_string(),
                a.action_type.clone(),
                a.finding_id.clone(),
                truncate(&a.title, 48),
                a.proposed_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(
        &["ID", "STATUS", "TYPE", "FINDING", "TITLE", "PROPOSED"],
        rows,
    );
    Ok(())
}

async fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let api = super::api_client(root)?;
    let action = api.get_action(id).await?;
    if json {
        return print_json(&action);
    }
    print_action(&action);
    Ok(())
}

fn print_action(a: &RemediationAction) {
    println!("{}  [{}]", a.title, a.status);
    println!("  id:       {}", a.id);
    println!("  type:     {}", a.action_type);
    println!("  finding:  {}", a.finding_id);
    if let Some(d) = &a.description {
        println!("  desc:     {d}");
    }
    println!("  params:   {}", a.params);
    println!("  proposed: {}", a.proposed_at.to_rfc3339());
    if let (Some(by), Some(at)) = (&a.approved_by, &a.approved_at) {
        let verb = if a.status == ActionStatus::Rejected {
            "rejected"
        } else {
            "approved"
        };
        println!("  {verb}: {} by {by}", at.to_rfc3339());
    }
    if let Some(at) = &a.executed_at {
        println!("  executed: {}", at.to_rfc3339());
    }
    if let Some(result) = &a.result {
        println!("  result:   {result}");
    }
    if let Some(msg) = &a.error_message {
        println!("  error:    {msg}");
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Verb {
    Approve,
    Reject,
}

async fn review(root: &Path, id: &str, by: &str, verb: Verb, json: bool) -> anyhow::Result<()> {
    let session = ReviewSession::new(super::api_client(root)?, by);
    session.refresh().await?;

    let outcome = match verb {
        Verb::Approve => session.approve(id).await?,
        Verb::Reject => session.reject(id).await?,
    };
    let Outcome::Applied(action) = outcome else {
        anyhow::bail!("a review of {id} is already in progress");
    };

    if json {
        return print_json(&action);
    }
    println!(
        "{} {} ({})",
        action.status,
        action.id,
        action.approved_by.as_deref().unwrap_or(by)
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Propose
// ---------------------------------------------------------------------------

fn propose(root: &Path, new: NewAction, json: bool) -> anyhow::Result<()> {
    let db = super::open_db(root)?;
    let action = db.propose(new)?;
    if json {
        print_json(&action)?;
    } else {
        println!("proposed {}", action.id);
    }
    Ok(())
}
