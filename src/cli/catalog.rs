use super::{CommandContext, OutputFormat};
use anyhow::Result;
use serde_json::json;

use moviehub::models::{Category, Movie};

pub enum CatalogCommand {
    Categories,
    Library { page: u32, per_page: u32 },
    Movies { categories: Vec<String> },
    Movie { id: String },
    Series { id: String },
    SeriesList { search: Option<String> },
    Search { query: String },
    Browse { limit: Option<usize> },
}

impl CatalogCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        match self {
            Self::Categories => {
                let read = context.hub.catalog.categories().await;
                context.warn_degraded("categories", read.is_degraded());
                let categories = read.into_value();

                match context.format {
                    OutputFormat::Json => context.print_json(&categories)?,
                    OutputFormat::Text => print_categories(&categories),
                }
            }

            Self::Library { page, per_page } => {
                let listing = context.hub.api.movies(page, per_page).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&listing)?,
                    OutputFormat::Text => {
                        print_movies(&listing.movies, None);
                        println!(
                            "\nPage {} ({} movies total)",
                            page, listing.total_movies
                        );
                    }
                }
            }

            Self::Movies { categories } => {
                let reads = context.hub.catalog.movies_by_categories(&categories).await;

                let mut results = Vec::new();
                for category_id in &categories {
                    if let Some(read) = reads.get(category_id) {
                        context.warn_degraded(
                            &format!("movies for {}", category_id),
                            read.is_degraded(),
                        );
                        results.push((category_id.clone(), read.value().clone()));
                    }
                }

                match context.format {
                    OutputFormat::Json => {
                        let grouped: Vec<_> = results
                            .iter()
                            .map(|(id, movies)| json!({ "category": id, "movies": movies }))
                            .collect();
                        context.print_json(&grouped)?;
                    }
                    OutputFormat::Text => {
                        for (id, movies) in &results {
                            println!("\n{}:", id);
                            print_movies(movies, None);
                        }
                    }
                }
            }

            Self::Movie { id } => {
                let movie = context.hub.api.movie(&id).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&movie)?,
                    OutputFormat::Text => print_movie_details(&movie),
                }
            }

            Self::Series { id } => {
                let read = context.hub.catalog.series_bundle(&id).await;
                context.warn_degraded("series", read.is_degraded());
                let bundle = read.into_value();

                match context.format {
                    OutputFormat::Json => context.print_json(&bundle)?,
                    OutputFormat::Text => {
                        match &bundle.series {
                            Some(series) => {
                                println!("{}", series.name);
                                if let Some(description) = &series.description {
                                    println!("{}\n", description);
                                }
                            }
                            None => println!("Series {} not found", id),
                        }
                        print_movies(&bundle.movies, None);
                    }
                }
            }

            Self::SeriesList { search } => {
                let series = context.hub.api.all_series(search.as_deref()).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&series)?,
                    OutputFormat::Text => {
                        if series.is_empty() {
                            println!("No series found");
                        }
                        for s in &series {
                            println!("{:24} | {}", s.id, s.name);
                        }
                    }
                }
            }

            Self::Search { query } => {
                let movies = context.hub.api.search_movies(&query).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&movies)?,
                    OutputFormat::Text => {
                        if movies.is_empty() {
                            println!("No results found for '{}'", query);
                        } else {
                            print_movies(&movies, None);
                        }
                    }
                }
            }

            Self::Browse { limit } => {
                let read = context.hub.catalog.categories().await;
                context.warn_degraded("categories", read.is_degraded());
                let categories = read.into_value();

                let ids: Vec<String> = categories.iter().map(|c| c.id.clone()).collect();
                let reads = context.hub.catalog.movies_by_categories(&ids).await;

                match context.format {
                    OutputFormat::Json => {
                        let rows: Vec<_> = categories
                            .iter()
                            .map(|c| {
                                let movies = reads
                                    .get(&c.id)
                                    .map(|r| r.value().clone())
                                    .unwrap_or_default();
                                json!({ "category": c, "movies": movies })
                            })
                            .collect();
                        context.print_json(&rows)?;
                    }
                    OutputFormat::Text => {
                        for category in &categories {
                            println!("\n{}:", category);
                            match reads.get(&category.id) {
                                Some(read) => print_movies(read.value(), limit),
                                None => println!("  (nothing)"),
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn print_categories(categories: &[Category]) {
    if categories.is_empty() {
        println!("No categories found");
        return;
    }
    for category in categories {
        println!("{:24} | {} (/category/{})", category.id, category.name, category.slug());
    }
}

fn print_movies(movies: &[Movie], limit: Option<usize>) {
    if movies.is_empty() {
        println!("  (no movies)");
        return;
    }
    for movie in movies.iter().take(limit.unwrap_or(usize::MAX)) {
        match movie.rating {
            Some(rating) => println!("  {:24} | {} ★{:.1}", movie.id, movie, rating),
            None => println!("  {:24} | {}", movie.id, movie),
        }
    }
    if let Some(limit) = limit
        && movies.len() > limit
    {
        println!("  ... and {} more", movies.len() - limit);
    }
}

fn print_movie_details(movie: &Movie) {
    println!("Title: {}", movie);
    println!("ID: {}", movie.id);
    if let Some(duration) = &movie.duration {
        println!("Duration: {}", duration);
    }
    if let Some(rating) = movie.rating {
        println!("Rating: {:.1}", rating);
    }
    if !movie.genre.is_empty() {
        println!("Genre: {}", movie.genre.join(", "));
    }
    if let Some(director) = &movie.director {
        println!("Director: {}", director);
    }
    if !movie.cast.is_empty() {
        println!("Cast: {}", movie.cast.join(", "));
    }
    if let Some(description) = &movie.description {
        println!("\n{}", description);
    }
    if let Some(review) = &movie.review {
        println!("\nReview:\n{}", review);
    }
    if let Some(url) = &movie.movie_url {
        println!("\nStream: {}", url);
    }
}
