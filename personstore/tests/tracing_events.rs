use personstore::{memory::InMemoryStore, prelude::*};
use std::{
    io,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn count_reports_its_outcome() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let people = PersonStore::open(InMemoryStore::new(), &StoreConfig::default())
        .await
        .unwrap();
    people
        .create_many(vec![NewPerson::named("Bob Smith"), NewPerson::named("Mary")])
        .await
        .unwrap();

    assert_eq!(people.count(None).await.unwrap(), 2);

    let log = captured.text();
    let line = log
        .lines()
        .find(|line| line.contains("counted=2"))
        .unwrap_or_else(|| panic!("no count event in:\n{log}"));
    assert!(line.contains("collection=Person"), "{line}");
}
