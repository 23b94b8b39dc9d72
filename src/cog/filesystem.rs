//! `cat` and `curl`: reading local files and remote URLs into chat.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::CodeToast;
use crate::commands::{
    CommandDescriptor, CommandError, CommandOptions, CommandResult, Invocation, handler,
};
use crate::host::{ChannelId, MessagePayload, UserId};
use crate::interface::{MAX_TEXT_PAGE_SIZE, PaginatorInterface, indicator_len};
use crate::paginator::language::detect_language;
use crate::paginator::{FilePaginator, PaginatorError, WrapOptions, WrappedPaginator};

/// Largest page size for file content.
const FILE_PAGE_SIZE: usize = 1985;

/// Fewest content bytes a page can hold; a page only closes when the next
/// line would overflow it, so it is at least half full.
const MIN_PAGE_FILL: usize = 512;

/// Headroom kept below the host's attachment limit.
const ATTACHMENT_MARGIN: u64 = 1024;

/// `path`, optionally followed by `#L<start>` or `#L<start>-L<end>`.
#[allow(clippy::unwrap_used)]
static CAT_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\./+)?(.+?)(?:#L?(\d+)(?:-L?(\d+))?)?$").unwrap()
});

pub(super) fn descriptors() -> Vec<CommandDescriptor<CodeToast>> {
    vec![
        CommandDescriptor::new(
            "toast_cat",
            CommandOptions::new("cat").help("Reads a file, optionally only a line range"),
        )
        .parent("toast")
        .handler(handler(cat)),
        CommandDescriptor::new(
            "toast_curl",
            CommandOptions::new("curl").help("Fetches a URL and shows the response body"),
        )
        .parent("toast")
        .handler(handler(curl)),
    ]
}

/// Splits a `cat` argument into a path and an optional 1-indexed line span.
fn parse_cat_argument(argument: &str) -> Result<(String, Option<(usize, usize)>), CommandError> {
    let unparseable = || CommandError::user("Couldn't parse this input.");
    let captures = CAT_ARGUMENT
        .captures(argument)
        .ok_or_else(unparseable)?;

    let path = captures.get(1).ok_or_else(unparseable)?.as_str().to_owned();
    let line_span = match captures.get(2) {
        None => None,
        Some(start) => {
            let start: usize = start.as_str().parse().map_err(|_| unparseable())?;
            let end = match captures.get(3) {
                Some(end) => end.as_str().parse().map_err(|_| unparseable())?,
                None => start,
            };
            Some((start, end))
        }
    };
    Ok((path, line_span))
}

/// Page size for `bytes` of content, leaving room for the widest page
/// indicator that much content can need.
fn file_page_size(bytes: usize) -> usize {
    let worst_pages = bytes / MIN_PAGE_FILL + 1;
    FILE_PAGE_SIZE.min(MAX_TEXT_PAGE_SIZE.saturating_sub(indicator_len(worst_pages)))
}

/// Human form of a byte limit, in whole megabytes.
fn megabytes(bytes: u64) -> String {
    format!("{}MB", bytes / (1024 * 1024))
}

async fn cat(cog: Arc<CodeToast>, invocation: Invocation) -> CommandResult {
    let (path, line_span) = parse_cat_argument(invocation.required_arg("path")?)?;

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if !metadata.is_dir() => metadata,
        _ => {
            return Err(CommandError::user(format!(
                "`{path}`: The file could not be found"
            )));
        }
    };

    let size = metadata.len();
    if size == 0 {
        return Err(CommandError::user(format!(
            "`{path}`: Cowardly refusing to read a file with no size stat \
             (it may be empty, endless or inaccessible)."
        )));
    }
    let max = cog.settings().max_file_size;
    if size > max {
        return Err(CommandError::user(format!(
            "`{path}`: Cowardly refusing to read a file >{}.",
            megabytes(max)
        )));
    }

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| CommandError::user(format!("`{path}`: Couldn't read this file, {e}")))?;
    debug!("Read {} bytes from {}", data.len(), path);

    let paginator = FilePaginator::wrapped(
        &data,
        line_span,
        &[path.as_str()],
        file_page_size(data.len()),
        WrapOptions::forced(),
    )
    .map_err(|e| match e {
        PaginatorError::Decode(_) => {
            CommandError::user(format!("`{path}`: Couldn't determine the encoding of this file."))
        }
        e => CommandError::user(format!("`{path}`: Couldn't read this file, {e}")),
    })?;

    paginate(&cog, paginator, invocation.author, invocation.channel).await
}

async fn curl(cog: Arc<CodeToast>, invocation: Invocation) -> CommandResult {
    let url = invocation
        .required_arg("url")?
        .trim_start_matches('<')
        .trim_end_matches('>');

    let response = cog
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| CommandError::user(format!("Couldn't fetch `{url}`: {e}")))?;

    let code = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let body = response.bytes().await.map_err(|e| {
        CommandError::user(format!("Couldn't read response (status code {code}), {e}"))
    })?;
    debug!("Fetched {} bytes from {} ({})", body.len(), url, code);

    deliver_response(&cog, &invocation, &body, [content_type.as_str(), url], code).await
}

/// Sends a fetched body as an attachment, or paginates it when too large.
async fn deliver_response(
    cog: &Arc<CodeToast>,
    invocation: &Invocation,
    body: &[u8],
    hints: [&str; 2],
    code: u16,
) -> CommandResult {
    let host = cog.host();
    if body.is_empty() {
        host.send(
            invocation.channel,
            MessagePayload::text(format!("HTTP response was empty (status code {code}).")),
        )
        .await?;
        return Ok(());
    }

    let threshold = host
        .filesize_limit(invocation.channel)
        .saturating_sub(ATTACHMENT_MARGIN);
    let size = u64::try_from(body.len()).unwrap_or(u64::MAX);

    if size < threshold {
        let language = hints
            .iter()
            .find_map(|hint| detect_language(hint))
            .unwrap_or("txt");
        host.send(
            invocation.channel,
            MessagePayload::file(format!("response.{language}"), body.to_vec()),
        )
        .await?;
        return Ok(());
    }

    let page_size = file_page_size(body.len());
    let paginator = FilePaginator::wrapped(body, None, &hints, page_size, WrapOptions::forced())
        .map_err(|e| match e {
            PaginatorError::Decode(_) => CommandError::user(format!(
                "Couldn't determine the encoding of the response. (status code {code})"
            )),
            e => CommandError::user(format!("Couldn't read response (status code {code}), {e}")),
        })?;

    paginate(cog, paginator, invocation.author, invocation.channel).await
}

/// Hands `paginator` to a new interface owned by `owner`.
async fn paginate(
    cog: &Arc<CodeToast>,
    paginator: FilePaginator<WrappedPaginator>,
    owner: UserId,
    channel: ChannelId,
) -> CommandResult {
    let interface = PaginatorInterface::new(
        Arc::clone(cog.host()),
        paginator,
        cog.interface_options(owner),
    )?;
    interface.send_to(channel).await?;
    Ok(())
}
