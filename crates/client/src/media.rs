use divemedia_core::{FavoriteResponse, SaveMediaRequest};
use futures::future::join_all;
use tracing::{instrument, warn};

use crate::{DiveMediaClient, Error, RequestOptions, segment};

/// Outcome of one item in a fan-out media operation.
#[derive(Debug)]
pub struct BatchItemResult {
    pub media_id: String,
    pub result: Result<(), Error>,
}

impl BatchItemResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl DiveMediaClient {
    /// Register an object already uploaded to storage with a dive.
    #[instrument(skip(self, media), fields(filename = %media.filename))]
    pub async fn save_media(&self, dive_id: &str, media: &SaveMediaRequest) -> Result<(), Error> {
        self.request_empty(
            "/media/save",
            RequestOptions::post()
                .query("dive_id", dive_id)
                .json(media)?,
        )
        .await
    }

    /// Delete one media item.
    #[instrument(skip(self))]
    pub async fn delete_media(&self, media_id: &str) -> Result<(), Error> {
        self.request_empty(
            &format!("/media/{}", segment(media_id)),
            RequestOptions::delete(),
        )
        .await
    }

    /// Reassign a media item to another dive.
    #[instrument(skip(self))]
    pub async fn move_media(&self, media_id: &str, new_dive_id: &str) -> Result<(), Error> {
        self.request_empty(
            &format!("/media/{}/move", segment(media_id)),
            RequestOptions::patch().query("new_dive_id", new_dive_id),
        )
        .await
    }

    /// Flip the favorite flag and return the new value.
    #[instrument(skip(self))]
    pub async fn toggle_favorite(&self, media_id: &str) -> Result<bool, Error> {
        let resp: FavoriteResponse = self
            .request(
                &format!("/media/{}/toggle_favorite", segment(media_id)),
                RequestOptions::post(),
            )
            .await?;
        Ok(resp.is_favorite)
    }

    /// Delete several media items concurrently. Every item is attempted; the
    /// result for each is reported in input order.
    pub async fn delete_media_batch(&self, media_ids: &[String]) -> Vec<BatchItemResult> {
        let results = join_all(media_ids.iter().map(|id| self.delete_media(id))).await;
        collect_batch(media_ids, results, "delete")
    }

    /// Move several media items to `new_dive_id` concurrently.
    pub async fn move_media_batch(
        &self,
        media_ids: &[String],
        new_dive_id: &str,
    ) -> Vec<BatchItemResult> {
        let results =
            join_all(media_ids.iter().map(|id| self.move_media(id, new_dive_id))).await;
        collect_batch(media_ids, results, "move")
    }
}

fn collect_batch(
    media_ids: &[String],
    results: Vec<Result<(), Error>>,
    op: &str,
) -> Vec<BatchItemResult> {
    media_ids
        .iter()
        .zip(results)
        .map(|(id, result)| {
            if let Err(e) = &result {
                warn!(media_id = %id, op, error = %e, "media batch item failed");
            }
            BatchItemResult {
                media_id: id.clone(),
                result,
            }
        })
        .collect()
}
