use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::models::Note;

/// Embeds notes that have no vector yet and stores the result.
///
/// Notes are written without embeddings, so scans that compare against
/// notes call this first. Failures leave the note unembedded and are only
/// logged. Returns how many notes gained an embedding.
pub async fn backfill_note_embeddings(
    db: &dyn DatabaseBackend,
    gateway: &EmbeddingGateway,
    notes: &mut [Note],
) -> usize {
    let pending: Vec<usize> = notes
        .iter()
        .enumerate()
        .filter(|(_, note)| note.embedding.is_none() && !note.embedding_text().trim().is_empty())
        .map(|(i, _)| i)
        .collect();
    if pending.is_empty() {
        return 0;
    }

    let texts: Vec<String> = pending.iter().map(|&i| notes[i].embedding_text()).collect();
    let results = gateway.embed_batch(&texts).await;

    let mut filled = 0;
    for (&i, result) in pending.iter().zip(results) {
        let note = &mut notes[i];
        match result {
            Ok(vector) => {
                if let Err(e) = db.update_note_embedding(&note.owner, &note.id, &vector).await {
                    tracing::warn!(note_id = %note.id, error = %e, "Failed to store note embedding");
                    continue;
                }
                note.embedding = Some(vector);
                filled += 1;
            }
            Err(e) => {
                tracing::warn!(note_id = %note.id, error = %e, "Failed to embed note");
            }
        }
    }

    tracing::debug!(pending = pending.len(), filled, "Back-filled note embeddings");
    filled
}
