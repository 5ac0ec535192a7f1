use divemedia_core::{Dive, DiveLog, NewDive, RenameDive};
use tracing::instrument;

use crate::{DiveMediaClient, Error, RequestOptions, segment};

/// What to do with a dive's media when the dive is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteDiveOptions {
    /// Delete the media items too instead of leaving them unassigned.
    pub delete_media: bool,
}

impl DiveMediaClient {
    // =========================================================================
    // Dives
    // =========================================================================

    /// List the current user's dives.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), divemedia_client::Error> {
    /// use divemedia_client::DiveMediaClient;
    ///
    /// let client = DiveMediaClient::builder("http://localhost:8000")
    ///     .access_token("token")
    ///     .build()?;
    /// for dive in client.list_dives().await? {
    ///     println!("{} ({} items)", dive.name, dive.media_items.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub async fn list_dives(&self) -> Result<Vec<Dive>, Error> {
        self.request("/dives/", RequestOptions::get()).await
    }

    /// Fetch a dive with its media items.
    #[instrument(skip(self))]
    pub async fn get_dive(&self, dive_id: &str) -> Result<Dive, Error> {
        self.request(&format!("/dives/{}", segment(dive_id)), RequestOptions::get())
            .await
    }

    /// Create a new dive.
    #[instrument(skip(self, dive), fields(name = %dive.name))]
    pub async fn create_dive(&self, dive: &NewDive) -> Result<Dive, Error> {
        self.request("/dives/save", RequestOptions::post().json(dive)?)
            .await
    }

    /// Rename a dive and return the updated record.
    #[instrument(skip(self))]
    pub async fn rename_dive(&self, dive_id: &str, name: &str) -> Result<Dive, Error> {
        let body = RenameDive {
            name: name.to_owned(),
        };
        self.request(
            &format!("/dives/{}", segment(dive_id)),
            RequestOptions::patch().json(&body)?,
        )
        .await
    }

    /// Delete a dive, optionally together with its media.
    #[instrument(skip(self))]
    pub async fn delete_dive(&self, dive_id: &str, options: DeleteDiveOptions) -> Result<(), Error> {
        self.request_empty(
            &format!("/dives/{}", segment(dive_id)),
            RequestOptions::delete().query("delete_media", options.delete_media),
        )
        .await
    }

    // =========================================================================
    // Dive logs
    // =========================================================================

    /// Fetch the log for a dive. A dive without a log yields `Ok(None)`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> Result<(), divemedia_client::Error> {
    /// use divemedia_client::DiveMediaClient;
    ///
    /// let client = DiveMediaClient::builder("http://localhost:8000")
    ///     .access_token("token")
    ///     .build()?;
    /// match client.get_dive_log("42").await? {
    ///     Some(log) => println!("max depth: {:?}", log.max_depth),
    ///     None => println!("no log yet"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub async fn get_dive_log(&self, dive_id: &str) -> Result<Option<DiveLog>, Error> {
        match self
            .request(
                &format!("/dives/{}/log", segment(dive_id)),
                RequestOptions::get(),
            )
            .await
        {
            Ok(log) => Ok(Some(log)),
            Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or replace the log for a dive.
    #[instrument(skip(self, log))]
    pub async fn save_dive_log(&self, dive_id: &str, log: &DiveLog) -> Result<(), Error> {
        self.request_empty(
            &format!("/dives/{}/log", segment(dive_id)),
            RequestOptions::post().json(log)?,
        )
        .await
    }
}
