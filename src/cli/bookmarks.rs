use super::{CommandContext, OutputFormat};
use anyhow::Result;

pub enum BookmarksCommand {
    List,
    Add { movie_id: String },
    Remove { movie_id: String },
}

impl BookmarksCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let session = context.require_session().await?;
        let user_id = session.id();

        match self {
            Self::List => {
                let bookmarks = context.hub.api.bookmarks(user_id).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&bookmarks)?,
                    OutputFormat::Text => {
                        if bookmarks.is_empty() {
                            println!("No bookmarks yet");
                        } else {
                            for bookmark in &bookmarks {
                                let year = bookmark
                                    .year
                                    .map(|y| format!(" ({})", y as i64))
                                    .unwrap_or_default();
                                println!("{:24} | {}{}", bookmark.id, bookmark.title, year);
                            }
                        }
                    }
                }
            }
            Self::Add { movie_id } => {
                context
                    .hub
                    .api
                    .add_bookmark(user_id, &movie_id)
                    .await
                    .map_err(|e| anyhow::anyhow!("Could not bookmark {}: {}", movie_id, e))?;
                println!("Bookmarked {}", movie_id);
            }
            Self::Remove { movie_id } => {
                context
                    .hub
                    .api
                    .remove_bookmark(user_id, &movie_id)
                    .await
                    .map_err(|e| anyhow::anyhow!("Could not remove bookmark {}: {}", movie_id, e))?;
                println!("Removed bookmark {}", movie_id);
            }
        }

        Ok(())
    }
}
