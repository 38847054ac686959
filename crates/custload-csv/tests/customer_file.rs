use std::io::Write;
use std::sync::{Arc, Mutex};

use custload_core::{
    AlwaysSkip, BatchError, BatchStatus, CountryFilter, Customer, CustomerLineMapper, ItemError,
    MappingError, MemorySink, SkipListener, Stage, StepBuilder,
};
use custload_csv::CsvSourceBuilder;

const CUSTOMERS: &str = "\
id,firstName,lastName,email,gender,contactNo,country,dob
1,Ada,Lovelace,ada@example.com,Female,555-0100,United States,1815-12-10
2,Alan,Turing,alan@example.com,Male,555-0101,United Kingdom,1912-06-23
abc,Grace,Hopper,grace@example.com,Female,555-0102,United States,1906-12-09
4,\"Hamilton, M\",Margaret,mh@example.com,Female,555-0103,United States,1936-08-17
5,Short,Row
";

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    write_bytes(contents.as_bytes())
}

fn write_bytes(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(contents).expect("write csv");
    f
}

async fn load(path: &std::path::Path, skip_limit: u64) -> (custload_core::StepExecutionResult, Vec<Customer>) {
    let sink = Arc::new(MemorySink::<Customer>::new());
    let source = CsvSourceBuilder::new(path)
        .names(Customer::field_names())
        .build()
        .expect("csv source");
    let result = StepBuilder::new("csv-step")
        .chunk_size(2)
        .concurrency_limit(3)
        .skip_limit(skip_limit)
        .source(source)
        .mapper(CustomerLineMapper::new())
        .processor(CountryFilter::default())
        .sink(sink.clone())
        .build()
        .expect("step")
        .run()
        .await;
    let mut items = sink.items();
    items.sort_by_key(|c| c.id);
    (result, items)
}

#[tokio::test]
async fn imports_us_customers_and_skips_bad_ids() {
    let f = write_csv(CUSTOMERS);
    let (result, items) = load(f.path(), 5).await;

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(result.items_read, 5);
    assert_eq!(result.read_skips, 1);
    // Row 5 is padded and its empty country is filtered out.
    assert_eq!(result.items_filtered, 2);
    assert_eq!(items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 4]);
    assert_eq!(items[1].first_name, "Hamilton, M");
}

#[tokio::test]
async fn zero_skip_limit_fails_on_bad_id() {
    let f = write_csv(CUSTOMERS);
    let (result, _) = load(f.path(), 0).await;

    assert_eq!(result.status, BatchStatus::Failed);
    assert_eq!(result.items_skipped, 0);
    match result.failure.as_deref() {
        Some(BatchError::SkipLimitExceeded { stage, .. }) => assert_eq!(*stage, Stage::Read),
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn missing_input_fails_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (result, items) = load(&dir.path().join("missing.csv"), 5).await;
    assert_eq!(result.status, BatchStatus::Failed);
    assert!(result.failure.expect("failure").is_resource());
    assert!(items.is_empty());
}

#[derive(Default)]
struct ReadSkips(Mutex<Vec<u64>>);

impl SkipListener<Customer> for ReadSkips {
    fn on_skip_in_read(&self, error: &ItemError) {
        if let ItemError::Mapping(e) = error {
            self.0.lock().unwrap().push(e.line());
        }
    }
}

#[tokio::test]
async fn undecodable_row_is_skipped_and_reported() {
    let f = write_bytes(
        b"id,firstName,lastName,email,gender,contactNo,country,dob\n\
1,A,B,a@x,M,111,United States,d\n\
2,\xff\xfe,B,b@x,M,222,United States,d\n\
3,C,D,c@x,F,333,United States,d\n",
    );
    let sink = Arc::new(MemorySink::<Customer>::new());
    let listener = Arc::new(ReadSkips::default());
    let source = CsvSourceBuilder::new(f.path())
        .names(Customer::field_names())
        .build()
        .expect("csv source");
    let result = StepBuilder::new("utf8")
        .chunk_size(1)
        .skip_limit(5)
        .skip_policy(AlwaysSkip)
        .source(source)
        .mapper(CustomerLineMapper::new())
        .processor(CountryFilter::default())
        .sink(sink.clone())
        .listener(listener.clone())
        .build()
        .expect("step")
        .run()
        .await;

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(result.items_read, 3);
    assert_eq!(result.read_skips, 1);
    let mut ids: Vec<i64> = sink.items().iter().map(|c| c.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(*listener.0.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn undecodable_row_is_not_a_number_format_error() {
    let f = write_bytes(b"h\n\xff,A,B,a,M,1,United States,d\n");
    let (result, items) = load(f.path(), 5).await;

    assert_eq!(result.status, BatchStatus::Failed);
    assert!(items.is_empty());
    assert!(matches!(
        result.failure.as_deref(),
        Some(BatchError::NonSkippable {
            stage: Stage::Read,
            source: ItemError::Mapping(MappingError::Other { line: 2, .. }),
        })
    ));
}
