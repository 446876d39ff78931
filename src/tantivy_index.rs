use std::cmp::Reverse;

use tantivy::{
    DocId,
    Index,
    IndexReader,
    IndexWriter,
    Score,
    SegmentReader,
    Term,
    collector::TopDocs,
    doc,
    query::{
        BooleanQuery,
        FuzzyTermQuery,
        Occur,
        Query,
        QueryParser,
        TermQuery,
    },
    schema::*,
    tokenizer::{
        LowerCaser,
        NgramTokenizer,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::error::Result;

/// Field names used in the schema.
pub mod fields {
    pub const DOC_KEY: &str = "doc_key";
    pub const SEQ: &str = "seq";
    pub const BODY: &str = "body";
    pub const BODY_NGRAM: &str = "body_ngram";
}

/// Memory budget handed to the Tantivy writer.
const WRITER_MEMORY_BUDGET: usize = 15_000_000;

/// Query terms shorter than this never get a fuzzy clause.
const MIN_FUZZY_TERM_LEN: usize = 3;

/// Width of the character n-grams indexed for substring lookup.
pub const NGRAM_LEN: usize = 3;

const NGRAM_TOKENIZER: &str = "ngram3";

/// In-memory BM25 index over document content.
///
/// Only the key and insertion sequence are kept per document; the content
/// itself lives in the [`DocumentStore`](crate::store::DocumentStore).
/// Besides the stemmed word index, the body is indexed as lowercased
/// character trigrams so that any substring of three or more characters
/// can be narrowed down without scanning every document.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub doc_key: Field,
    pub seq: Field,
    pub body: Field,
    pub body_ngram: Field,
}

/// A lexical match.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub score: f32,
    pub seq: u64,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let doc_key = builder.add_text_field(fields::DOC_KEY, STRING);
    let seq = builder.add_u64_field(fields::SEQ, FAST);

    let body_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let body = builder.add_text_field(fields::BODY, body_opts);

    let ngram_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(NGRAM_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqs),
    );
    let body_ngram = builder.add_text_field(fields::BODY_NGRAM, ngram_opts);

    let schema = builder.build();
    let fields = SchemaFields {
        doc_key,
        seq,
        body,
        body_ngram,
    };

    (schema, fields)
}

fn register_tokenizers(index: &Index) -> Result<()> {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);

    let ngram = TextAnalyzer::builder(NgramTokenizer::new(
        NGRAM_LEN, NGRAM_LEN, false,
    )?)
    .filter(LowerCaser)
    .build();
    index.tokenizers().register(NGRAM_TOKENIZER, ngram);

    Ok(())
}

/// Lowercased character n-grams of `text`, in the same form the index
/// stores them. Texts shorter than [`NGRAM_LEN`] characters have none.
pub fn ngrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut grams: Vec<String> = chars
        .windows(NGRAM_LEN)
        .map(|w| w.iter().collect::<String>().to_lowercase())
        .collect();
    grams.sort();
    grams.dedup();
    grams
}

impl LexicalIndex {
    /// Create an empty in-memory index with its single writer.
    pub fn open_in_ram() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index)?;
        let reader = index.reader()?;
        let writer = index.writer(WRITER_MEMORY_BUDGET)?;

        Ok(Self {
            index,
            reader,
            writer,
            fields,
        })
    }

    /// Stage a document for the next commit, replacing any earlier document
    /// with the same key.
    pub fn stage(&self, doc_key: &str, seq: u64, body: &str) -> Result<()> {
        let f = self.fields;

        self.writer
            .delete_term(Term::from_field_text(f.doc_key, doc_key));
        self.writer.add_document(doc!(
            f.doc_key => doc_key,
            f.seq => seq,
            f.body => body,
            f.body_ngram => body,
        ))?;

        Ok(())
    }

    /// Commit staged documents and make them visible to searches.
    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Discard everything staged since the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        self.writer.rollback()?;
        Ok(())
    }

    /// Number of live documents visible to searches.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Search the body with BM25 scoring.
    ///
    /// Returns the top `limit` hits, best first; equal scores are ordered by
    /// insertion sequence.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
    ) -> Result<Vec<LexicalHit>> {
        let query = self.parse(query_str);
        self.collect(&*query, limit)
    }

    /// Search with BM25 plus Levenshtein-distance-1 matching per term.
    ///
    /// Each query term of at least three characters adds a fuzzy clause on
    /// the body, OR-ed with the parsed query.
    pub fn search_fuzzy(
        &self,
        query_str: &str,
        limit: usize,
    ) -> Result<Vec<LexicalHit>> {
        let f = self.fields;

        let mut should_clauses: Vec<(Occur, Box<dyn Query>)> =
            vec![(Occur::Should, self.parse(query_str))];

        for term_str in query_str.split_whitespace() {
            if term_str.chars().count() >= MIN_FUZZY_TERM_LEN {
                let term =
                    Term::from_field_text(f.body, &term_str.to_lowercase());
                let fuzzy = FuzzyTermQuery::new(term, 1, true);
                should_clauses.push((Occur::Should, Box::new(fuzzy)));
            }
        }

        let combined = BooleanQuery::new(should_clauses);
        self.collect(&combined, limit)
    }

    /// Documents whose body contains every one of `grams`.
    ///
    /// This over-approximates substring containment: the grams may occur
    /// apart from each other, so callers verify the content themselves.
    pub fn search_ngrams(
        &self,
        grams: &[String],
        limit: usize,
    ) -> Result<Vec<LexicalHit>> {
        if grams.is_empty() {
            return Ok(Vec::new());
        }
        let f = self.fields;

        let must_clauses: Vec<(Occur, Box<dyn Query>)> = grams
            .iter()
            .map(|gram| {
                let term = Term::from_field_text(f.body_ngram, gram);
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    term,
                    IndexRecordOption::WithFreqs,
                ));
                (Occur::Must, query)
            })
            .collect();

        self.collect(&BooleanQuery::new(must_clauses), limit)
    }

    fn parse(&self, query_str: &str) -> Box<dyn Query> {
        let parser =
            QueryParser::for_index(&self.index, vec![self.fields.body]);
        let (query, _errors) = parser.parse_query_lenient(query_str);
        query
    }

    fn collect(
        &self,
        query: &dyn Query,
        limit: usize,
    ) -> Result<Vec<LexicalHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();

        // Rank by score, then by earliest insertion.
        let collector = TopDocs::with_limit(limit).tweak_score(
            move |segment_reader: &SegmentReader| {
                let seq_column =
                    segment_reader.fast_fields().u64(fields::SEQ).ok();
                move |doc: DocId, score: Score| {
                    let seq = seq_column
                        .as_ref()
                        .and_then(|c| c.first(doc))
                        .unwrap_or(u64::MAX);
                    (score, Reverse(seq))
                }
            },
        );

        let top_docs = searcher.search(query, &collector)?;

        Ok(top_docs
            .into_iter()
            .filter(|((_, Reverse(seq)), _)| *seq != u64::MAX)
            .map(|((score, Reverse(seq)), _)| LexicalHit { score, seq })
            .collect())
    }
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex").finish_non_exhaustive()
    }
}
