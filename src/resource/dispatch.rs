use crate::error::Result;
use crate::http::mime::MimeType;
use crate::http::request::{MessageBody, RequestState};
use crate::http::response::{CachePolicy, ResponseStream, StatusCode};
use crate::resource::registry::{ContentGenerator, Continuation, ResourceContent, ResourceRegistry};

/// Routes a decoded request to its resource and writes the response.
///
/// Unmatched paths get a header-only `404`.
pub(crate) fn dispatch(
    registry: &ResourceRegistry,
    stream: &ResponseStream,
    state: &mut RequestState,
    path: &[u8],
    query: Option<&[u8]>,
    body: &MessageBody<'_>,
) -> Result<()> {
    let path_text = String::from_utf8_lossy(path);
    state.path = path_text.to_string();

    let Some((index, entry)) = registry.find(path, body.mime_type) else {
        state.page_found = None;
        tracing::debug!(path = %path_text, "no resource matched");
        stream.write_header(StatusCode::NotFound, 0, CachePolicy::Disabled, MimeType::TextHtml)?;
        return stream.flush();
    };

    state.page_found = Some(index);
    let query_text = query.map(String::from_utf8_lossy);
    tracing::debug!(path = %path_text, pattern = %entry.pattern, kind = ?entry.content.kind(), "dispatching");

    match &entry.content {
        ResourceContent::Dynamic(generator) => {
            stream.enable_chunked_transfer()?;
            stream.write_header(StatusCode::Ok, 0, CachePolicy::Disabled, entry.mime_type)?;
            run_generator(generator.as_ref(), stream, state, &path_text, query_text.as_deref(), body);
            if finished(state) {
                stream.disable_chunked_transfer()?;
                stream.flush()?;
            }
        }
        ResourceContent::RawDynamic(generator) => {
            run_generator(generator.as_ref(), stream, state, &path_text, query_text.as_deref(), body);
            if finished(state) {
                stream.flush()?;
            }
        }
        ResourceContent::Static(payload) => {
            stream.write_header(StatusCode::Ok, payload.len(), CachePolicy::Enabled, entry.mime_type)?;
            if !payload.is_empty() {
                stream.write(payload)?;
            }
            stream.flush()?;
        }
        ResourceContent::RawStatic(payload) => {
            if !payload.is_empty() {
                stream.write(payload)?;
            }
            stream.flush()?;
        }
        ResourceContent::Resource(source) | ResourceContent::RawResource(source) => {
            stream.enable_chunked_transfer()?;
            stream.write_header(StatusCode::Ok, 0, CachePolicy::Disabled, entry.mime_type)?;
            stream.write_resource(source.as_ref())?;
            stream.disable_chunked_transfer()?;
            stream.flush()?;
        }
    }

    Ok(())
}

/// Hands a body fragment of the request in flight to its generator.
///
/// Fragments for routes without a generator are only counted down.
pub(crate) fn continue_body(
    registry: &ResourceRegistry,
    stream: &ResponseStream,
    state: &mut RequestState,
    fragment: &[u8],
) -> Result<()> {
    state.data_remaining = state
        .data_remaining
        .saturating_sub(u32::try_from(fragment.len()).unwrap_or(u32::MAX));

    let Some(entry) = state.page_found.and_then(|index| registry.get(index)) else {
        state.awaiting_body = false;
        return Ok(());
    };

    let (generator, chunked) = match &entry.content {
        ResourceContent::Dynamic(generator) => (generator.clone(), true),
        ResourceContent::RawDynamic(generator) => (generator.clone(), false),
        _ => {
            state.awaiting_body = false;
            return Ok(());
        }
    };

    let body = MessageBody {
        data: fragment,
        data_remaining: state.data_remaining,
        is_chunked_transfer: false,
        mime_type: state.mime_type,
        request_type: state.request_type,
    };
    let path = std::mem::take(&mut state.path);
    run_generator(generator.as_ref(), stream, state, &path, None, &body);
    state.path = path;

    if finished(state) {
        if chunked {
            stream.disable_chunked_transfer()?;
        }
        stream.flush()?;
    }
    Ok(())
}

fn run_generator(
    generator: &dyn ContentGenerator,
    stream: &ResponseStream,
    state: &mut RequestState,
    path: &str,
    query: Option<&str>,
    body: &MessageBody<'_>,
) {
    state.awaiting_body = match generator.generate(path, query, stream, body) {
        Ok(continuation) => continuation == Continuation::NeedMoreBody,
        Err(e) => {
            tracing::warn!(path, error = %e, "content generator failed");
            false
        }
    };
}

fn finished(state: &RequestState) -> bool {
    state.data_remaining == 0 && !state.awaiting_body
}

