//! Request command handlers.

use tabled::Tabled;

use maxxctl_core::{
    Console, CoreError, PaginationParams, ProxyRequest, ProxyUpstreamAttempt, RequestFilter,
};

use crate::cli::{GlobalOpts, RequestListArgs, RequestsArgs, RequestsCommand};
use crate::error::CliError;
use crate::output::{self, format_cost, format_nanos, or_dash, status_label};

use super::{loaded, unexpected};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct RequestRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Provider")]
    provider: u64,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Tokens in/out")]
    tokens: String,
    #[tabled(rename = "TTFT")]
    ttft: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl RequestRow {
    pub(crate) fn new(r: &ProxyRequest, color: bool) -> Self {
        Self {
            id: r.id,
            status: status_label(r.status, color),
            provider: r.provider_id,
            client: or_dash(&r.client_type).to_owned(),
            model: or_dash(&r.request_model).to_owned(),
            tokens: format!("{}/{}", r.input_token_count, r.output_token_count),
            ttft: format_nanos(r.ttft),
            duration: format_nanos(r.duration),
            cost: format_cost(r.cost),
        }
    }
}

#[derive(Tabled)]
struct AttemptRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Provider")]
    provider: u64,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "TTFT")]
    ttft: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl AttemptRow {
    fn new(a: &ProxyUpstreamAttempt, color: bool) -> Self {
        Self {
            id: a.id,
            status: status_label(a.status, color),
            provider: a.provider_id,
            model: or_dash(&a.request_model).to_owned(),
            ttft: format_nanos(a.ttft),
            duration: format_nanos(a.duration),
            cost: format_cost(a.cost),
        }
    }
}

fn detail(r: &ProxyRequest, color: bool) -> String {
    let time = |t: Option<chrono::DateTime<chrono::Utc>>| t.map_or_else(|| "-".into(), |t| t.to_rfc3339());
    let mut lines = vec![
        format!("ID:          {}", r.id),
        format!("Request ID:  {}", or_dash(&r.request_id)),
        format!("Status:      {}", status_label(r.status, color)),
        format!("HTTP status: {}", r.status_code),
        format!("Provider:    {}", r.provider_id),
        format!("Client:      {}", or_dash(&r.client_type)),
        format!("Model:       {}", or_dash(&r.request_model)),
        format!("Responded:   {}", or_dash(&r.response_model)),
        format!("Started:     {}", time(r.start_time)),
        format!("Ended:       {}", time(r.end_time)),
        format!("TTFT:        {}", format_nanos(r.ttft)),
        format!("Duration:    {}", format_nanos(r.duration)),
        format!(
            "Tokens:      {} in / {} out ({} cache read, {} cache write)",
            r.input_token_count, r.output_token_count, r.cache_read_count, r.cache_write_count
        ),
        format!("Cost:        {}", format_cost(r.cost)),
    ];
    if let Some(ref err) = r.error {
        lines.push(format!("Error:       {}", output::warn_label(err, color)));
    }
    lines.join("\n")
}

fn not_found(id: u64) -> impl FnOnce(CoreError) -> CliError {
    move |err| match err {
        CoreError::NotFound { .. } => CliError::NotFound {
            resource_type: "request".into(),
            identifier: id.to_string(),
            list_command: "requests list".into(),
        },
        other => other.into(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    args: RequestsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        RequestsCommand::List(list) => {
            let (items, next_cursor) = list_requests(console, &list).await?;
            let out = output::render_list(
                global.output,
                &items,
                |r| RequestRow::new(r, color),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            if let Some(cursor) = next_cursor {
                if !global.quiet {
                    eprintln!("More results: --before {cursor}");
                }
            }
            Ok(())
        }

        RequestsCommand::Get { id } => {
            let observer = console.request(id).await.map_err(not_found(id))?;
            let data = loaded(&observer)?;
            let req = data.as_request().ok_or_else(|| unexpected("request"))?;
            let out = output::render_single(
                global.output,
                req,
                |r| detail(r, color),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RequestsCommand::Attempts { id } => {
            let observer = console.attempts(id).await.map_err(not_found(id))?;
            let data = loaded(&observer)?;
            let attempts = data.as_attempts().ok_or_else(|| unexpected("attempts"))?;
            let out = output::render_list(
                global.output,
                attempts,
                |a| AttemptRow::new(a, color),
                |a| a.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RequestsCommand::Count(filter) => {
            let observer = console.requests_count(RequestFilter::from(filter)).await?;
            let count = loaded(&observer)?
                .as_count()
                .ok_or_else(|| unexpected("count"))?;
            let out =
                output::render_single(global.output, &count, u64::to_string, u64::to_string)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

/// Fetch the requested window and the cursor for the next one, if any.
async fn list_requests(
    console: &Console,
    list: &RequestListArgs,
) -> Result<(Vec<ProxyRequest>, Option<u64>), CliError> {
    let filter = RequestFilter::from(list.filter);

    if let Some(pages) = list.pages {
        let observer = console.requests_infinite(filter, Some(list.limit)).await?;
        for _ in 1..pages {
            if !console.load_more(filter).await? {
                break;
            }
        }
        let data = loaded(&observer)?;
        let pages = data.as_pages().ok_or_else(|| unexpected("request pages"))?;
        let cursor = pages.has_more().then(|| pages.next_cursor()).flatten();
        return Ok((pages.items().cloned().collect(), cursor));
    }

    let params = PaginationParams {
        limit: Some(list.limit),
        before: list.before,
        provider_id: filter.provider_id,
        status: filter.status,
    };
    let observer = console.requests(params).await?;
    let data = loaded(&observer)?;
    let page = data.as_page().ok_or_else(|| unexpected("request page"))?;
    let cursor = if page.has_more { page.last_id } else { None };
    Ok((page.items.clone(), cursor))
}
