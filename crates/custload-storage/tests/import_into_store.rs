use std::sync::Arc;

use custload_core::{
    CountryFilter, Customer, CustomerLineMapper, MemorySource, StepBuilder, StepExecutionResult,
};
use custload_storage::{CustomerStore, InMemoryCustomerStore};

const CUSTOMERS: &str = "\
id,firstName,lastName,email,gender,contactNo,country,dob
1,A,B,a@x,M,111,United States,2000-01-01
2,C,D,c@x,F,222,Canada,2000-01-01
x,E,F,e@x,M,333,United States,2000-01-01
3,G,H,g@x,F,444,United States,2000-01-01
";

async fn import<S>(store: Arc<S>) -> StepExecutionResult
where
    S: CustomerStore + 'static,
{
    let source =
        MemorySource::from_delimited(Customer::field_names(), CUSTOMERS, ',').lines_to_skip(1);
    StepBuilder::new("csv-step")
        .chunk_size(2)
        .concurrency_limit(4)
        .skip_limit(5)
        .source(source)
        .mapper(CustomerLineMapper::new())
        .processor(CountryFilter::default())
        .sink(store)
        .build()
        .expect("step")
        .run()
        .await
}

#[tokio::test]
async fn rerun_is_idempotent_in_memory() {
    let store = Arc::new(InMemoryCustomerStore::new());

    let first = import(store.clone()).await;
    assert!(first.is_completed());
    let after_first = store.all().await.unwrap();

    let second = import(store.clone()).await;
    assert!(second.is_completed());
    assert_eq!(store.all().await.unwrap(), after_first);
    assert_eq!(
        after_first.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn rerun_is_idempotent_in_sqlite() {
    use custload_storage::SqliteCustomerStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.db");
    let store = Arc::new(SqliteCustomerStore::open(path.to_str().unwrap()).await.unwrap());

    assert!(import(store.clone()).await.is_completed());
    assert!(import(store.clone()).await.is_completed());

    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.get(3).await.unwrap().unwrap().email, "g@x");
}
