pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use application::{
    Channel, ChannelId, ConnectionRegistry, CourseNotifier, CourseVectorService, DeliveryReport,
    EmbeddingService, RegistryConfig, ScoredRecord, VectorCollection, VectorServiceConfig,
    VectorStore,
};

pub use cli::Commands;

pub use connector::{
    DuckdbVectorStore, GeminiEmbedding, InMemoryVectorStore, MockEmbedding, WsChannel,
};

pub use domain::{
    ChapterId, ControlMessage, CourseId, DistanceMetric, DomainError, EmbeddingConfig,
    EventEnvelope, EventKind, Metadata, Namespace, SearchQuery, SearchResult, VectorRecord,
    EMBEDDING_DIMENSIONS,
};
