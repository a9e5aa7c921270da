//! Preconditions for sending a single caption request.

/// Whether a single-image caption request may be sent right now.
///
/// True iff an image is attached, the prompt and model are non-blank, and no
/// generation (single or batch) is in flight. Cheap enough to evaluate on
/// every state change; callers re-check it before submitting.
pub fn can_submit(
    has_file: bool,
    prompt_text: &str,
    model: &str,
    generating: bool,
    batch_running: bool,
) -> bool {
    has_file
        && !prompt_text.trim().is_empty()
        && !generating
        && !batch_running
        && !model.trim().is_empty()
}
