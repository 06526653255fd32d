mod common;

use common::{KeywordEmbedder, ScriptedModel, UnavailableModel, keyword_vector};
use docent::ingest::{Document, Ingestor, TextSplitter};
use docent::llm::{ChatMessage, Role};
use docent::query::{ConversationTurn, QueryOptions, QueryPipeline, retrieve};
use docent::vector::{InMemoryIndex, LanceIndex, VectorIndex};
use std::sync::Arc;

async fn ingest_pets(index: Arc<dyn VectorIndex>) {
    let ingestor = Ingestor::new(
        TextSplitter::new(10, 0).expect("splitter"),
        Arc::new(KeywordEmbedder),
        index,
        32,
    );
    let stats = ingestor
        .ingest_documents(&[Document::new("A cat sat. A dog ran.", "pets.txt")])
        .await
        .expect("ingest");
    assert_eq!(stats.chunks, 3);
}

fn pipeline(
    model: Arc<ScriptedModel>,
    index: Arc<dyn VectorIndex>,
    options: QueryOptions,
) -> QueryPipeline {
    QueryPipeline::new(model, Arc::new(KeywordEmbedder), index, options).expect("pipeline")
}

#[tokio::test]
async fn answers_from_the_chunk_that_matches_the_question() {
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(5));
    ingest_pets(index.clone()).await;

    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(
        model.clone(),
        index,
        QueryOptions {
            top_k: 1,
            max_history_turns: 20,
        },
    );

    let answer = pipeline.respond("What sat?", &[]).await.expect("respond");
    assert_eq!(answer, "From the context: A cat sat.");

    let requests = model.requests();
    assert_eq!(requests.len(), 2, "one rewrite call and one answer call");

    let rewrite = &requests[0];
    assert_eq!(rewrite.len(), 1);
    assert_eq!(rewrite[0].role, Role::User);
    assert!(rewrite[0].content.ends_with("Follow up question: What sat?"));

    let answer_request = &requests[1];
    assert_eq!(answer_request.len(), 2);
    assert_eq!(answer_request[0].role, Role::System);
    assert_eq!(answer_request[1], ChatMessage::user("What sat?"));
}

#[tokio::test]
async fn history_is_replayed_in_order_before_the_question() {
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(5));
    ingest_pets(index.clone()).await;

    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(model.clone(), index, QueryOptions::default());

    let history = vec![
        ConversationTurn::new("Is there a cat?", "Yes."),
        ConversationTurn::new("And a dog?", "Also yes."),
    ];
    pipeline
        .respond("What did the dog do?", &history)
        .await
        .expect("respond");

    let requests = model.requests();

    let transcript = &requests[0][0].content;
    assert!(transcript.contains(
        "Human: Is there a cat?\nAssistant: Yes.\n\nHuman: And a dog?\nAssistant: Also yes."
    ));

    let answer_request = &requests[1];
    assert_eq!(
        &answer_request[1..],
        &[
            ChatMessage::user("Is there a cat?"),
            ChatMessage::assistant("Yes."),
            ChatMessage::user("And a dog?"),
            ChatMessage::assistant("Also yes."),
            ChatMessage::user("What did the dog do?"),
        ]
    );
}

#[tokio::test]
async fn context_block_keeps_retrieval_order() {
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(5));
    ingest_pets(index.clone()).await;

    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(
        model.clone(),
        index.clone(),
        QueryOptions {
            top_k: 2,
            max_history_turns: 20,
        },
    );

    let answer = pipeline
        .respond("dog ran cat", &[])
        .await
        .expect("respond");

    let ranked = retrieve(&KeywordEmbedder, index.as_ref(), "dog ran cat", 2)
        .await
        .expect("retrieve");
    assert_eq!(ranked[0].text, " A dog ran");
    assert_eq!(ranked[1].text, "A cat sat.");
    assert_eq!(answer, "From the context:  A dog ran---------A cat sat.");
}

#[tokio::test]
async fn history_is_truncated_to_the_most_recent_turns() {
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new(5));
    ingest_pets(index.clone()).await;

    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(
        model.clone(),
        index,
        QueryOptions {
            top_k: 4,
            max_history_turns: 1,
        },
    );

    let history = vec![
        ConversationTurn::new("old question", "old answer"),
        ConversationTurn::new("recent question", "recent answer"),
    ];
    pipeline.respond("What sat?", &history).await.expect("respond");

    let requests = model.requests();
    assert!(!requests[0][0].content.contains("old question"));
    assert_eq!(
        &requests[1][1..],
        &[
            ChatMessage::user("recent question"),
            ChatMessage::assistant("recent answer"),
            ChatMessage::user("What sat?"),
        ]
    );
}

#[tokio::test]
async fn empty_index_still_asks_the_model() {
    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(model.clone(), Arc::new(InMemoryIndex::new(5)), QueryOptions::default());

    let answer = pipeline.respond("What sat?", &[]).await.expect("respond");
    assert_eq!(answer, "From the context: ");

    let system = &model.requests()[1][0];
    assert!(system.content.contains("just say that you don't know"));
}

#[tokio::test]
async fn model_failures_surface_to_the_caller() {
    let pipeline = QueryPipeline::new(
        Arc::new(UnavailableModel),
        Arc::new(KeywordEmbedder),
        Arc::new(InMemoryIndex::new(5)),
        QueryOptions::default(),
    )
    .expect("pipeline");

    let error = pipeline.respond("What sat?", &[]).await.expect_err("should fail");
    assert!(error.to_string().contains("rate limit exceeded"));
}

#[tokio::test]
async fn lance_index_round_trip_through_both_pipelines() {
    let temp = tempfile::tempdir().expect("tempdir");
    let index: Arc<dyn VectorIndex> =
        Arc::new(LanceIndex::open(temp.path(), 5).await.expect("open index"));

    ingest_pets(index.clone()).await;
    ingest_pets(index.clone()).await;
    assert_eq!(index.count().await.expect("count"), 3);

    let top = index
        .similarity_search(&keyword_vector("What sat?"), 1)
        .await
        .expect("search");
    assert_eq!(top[0].text, "A cat sat.");

    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(
        model,
        index,
        QueryOptions {
            top_k: 1,
            max_history_turns: 20,
        },
    );
    let answer = pipeline.respond("What sat?", &[]).await.expect("respond");
    assert_eq!(answer, "From the context: A cat sat.");
}

#[tokio::test]
async fn lance_index_drops_chunks_from_a_shortened_document() {
    let temp = tempfile::tempdir().expect("tempdir");
    let index: Arc<dyn VectorIndex> =
        Arc::new(LanceIndex::open(temp.path(), 5).await.expect("open index"));
    let ingestor = Ingestor::new(
        TextSplitter::new(10, 0).expect("splitter"),
        Arc::new(KeywordEmbedder),
        index.clone(),
        32,
    );

    ingestor
        .ingest_documents(&[Document::new("A cat sat. A dog ran. A bird flew.", "pets.txt")])
        .await
        .expect("first ingest");
    assert_eq!(index.count().await.expect("count"), 4);

    ingestor
        .ingest_documents(&[Document::new("A cat sat.", "pets.txt")])
        .await
        .expect("second ingest");
    assert_eq!(index.count().await.expect("count"), 1);

    let remaining = index
        .similarity_search(&keyword_vector("dog ran"), 4)
        .await
        .expect("search");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].text, "A cat sat.");
}
