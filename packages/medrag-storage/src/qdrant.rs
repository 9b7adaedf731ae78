pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";
pub const UPSERT_BATCH_SIZE: usize = 8;

use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, CreateCollectionBuilder, Distance, Document, Filter, Modifier, PointStruct, Query,
	QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder, SparseVectorsConfigBuilder,
	UpsertPointsBuilder, Vector, VectorParamsBuilder, VectorsConfigBuilder,
	point_id::PointIdOptions,
};

use medrag_domain::{Chunk, RetrievedChunk};

use crate::{Error, Result, payload};

/// One collection holding a named dense vector and a BM25 sparse vector per chunk.
pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &medrag_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection when missing. With `recreate`, an existing collection is
	/// dropped first.
	pub async fn ensure_collection(&self, recreate: bool) -> Result<()> {
		let exists = self.client.collection_exists(self.collection.clone()).await?;

		if exists && !recreate {
			return Ok(());
		}
		if exists {
			tracing::info!(collection = %self.collection, "Dropping existing collection.");

			self.client.delete_collection(self.collection.clone()).await?;
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
		);

		let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

		sparse_vectors_config.add_named_vector_params(
			BM25_VECTOR_NAME,
			SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
		);

		let builder = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(vectors_config)
			.sparse_vectors_config(sparse_vectors_config);

		self.client.create_collection(builder).await?;

		tracing::info!(
			collection = %self.collection,
			vector_dim = self.vector_dim,
			"Created collection."
		);

		Ok(())
	}

	/// Fails when the collection has not been built yet.
	pub async fn ensure_ready(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		Err(Error::NotFound(format!(
			"Qdrant collection {:?} does not exist. Run `medrag-ingest index` first.",
			self.collection
		)))
	}

	/// Upserts chunks with their dense vectors, aligned by position.
	pub async fn upsert_chunks(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
		if chunks.len() != vectors.len() {
			return Err(Error::InvalidArgument(format!(
				"{} chunks but {} vectors.",
				chunks.len(),
				vectors.len()
			)));
		}

		let mut written = 0;

		for (chunk_batch, vector_batch) in
			chunks.chunks(UPSERT_BATCH_SIZE).zip(vectors.chunks(UPSERT_BATCH_SIZE))
		{
			let mut points = Vec::with_capacity(chunk_batch.len());

			for (chunk, vector) in chunk_batch.iter().zip(vector_batch) {
				if vector.len() != self.vector_dim as usize {
					return Err(Error::InvalidArgument(format!(
						"Vector for {} has dimension {}, expected {}.",
						chunk.chunk_id,
						vector.len(),
						self.vector_dim
					)));
				}

				let mut named = HashMap::new();

				named.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vector.clone()));
				named.insert(
					BM25_VECTOR_NAME.to_string(),
					Vector::from(Document::new(chunk.text.clone(), BM25_MODEL)),
				);

				points.push(PointStruct::new(
					payload::point_id(&chunk.chunk_id),
					named,
					payload::chunk_payload(chunk)?,
				));
			}

			self.client
				.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
				.await?;

			written += chunk_batch.len();

			tracing::debug!(collection = %self.collection, written, "Upserted chunk batch.");
		}

		Ok(written)
	}

	/// Nearest neighbours by cosine similarity, optionally restricted to one language.
	pub async fn search_dense(
		&self,
		vector: Vec<f32>,
		top_k: u32,
		lang: Option<&str>,
	) -> Result<Vec<RetrievedChunk>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.limit(top_k.into())
			.with_payload(true);

		if let Some(lang) = lang {
			search = search.filter(Filter::all([Condition::matches("lang", lang.to_string())]));
		}

		let points = self.client.query(search).await?.result;

		Ok(collect_hits(points, RetrievedChunk::dense))
	}

	/// BM25 keyword search over chunk text.
	pub async fn search_sparse(&self, text: &str, top_k: u32) -> Result<Vec<RetrievedChunk>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(Document::new(text.to_string(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.limit(top_k.into())
			.with_payload(true);
		let points = self.client.query(search).await?.result;

		Ok(collect_hits(points, RetrievedChunk::sparse))
	}
}

fn collect_hits(
	points: Vec<ScoredPoint>,
	wrap: fn(Chunk, f32) -> RetrievedChunk,
) -> Vec<RetrievedChunk> {
	let mut hits = Vec::with_capacity(points.len());

	for point in points {
		let id = point_label(&point);

		match payload::chunk_from_payload(&id, point.payload) {
			Ok(chunk) => hits.push(wrap(chunk, point.score)),
			Err(err) => tracing::warn!(error = %err, "Skipping point with unreadable payload."),
		}
	}

	hits
}

fn point_label(point: &ScoredPoint) -> String {
	match point.id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
		Some(PointIdOptions::Uuid(id)) => id.clone(),
		Some(PointIdOptions::Num(id)) => id.to_string(),
		None => "<unknown>".to_string(),
	}
}
