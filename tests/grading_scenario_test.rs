use anyhow::Result;
use marking_desk::core::session::SessionPhase;
use marking_desk::domain::model::{CandidateId, Mark, QuestionId};
use marking_desk::{GradingSession, LocalCsvStore, MarkStore, MarkingError, ReferenceLoader};
use std::path::Path;
use tempfile::TempDir;

const ROSTER: &str = "\
Question,Marks,Marker 1,Marker 2
Exam,,,
Biology,,,
11,1,JD,
12,2,VM,JD
13,3,JD,VM
";

const RESPONSES: &str = "\
,Q11 Name the organelle,Q12 Explain osmosis,Q13 Describe diffusion
score,1,2,3
answer,Mitochondria,Water moves across a membrane (2),Net movement (1) down a gradient (2)
1,mito,water goes in,particles spread
2,nucleus,no idea,
3,mitochondrion,osmosis is diffusion of water,random motion
";

fn write_reference(dir: &Path) -> Result<ReferenceLoader> {
    let reference_dir = dir.join("reference");
    std::fs::create_dir_all(&reference_dir)?;
    std::fs::write(reference_dir.join("marking_groups.csv"), ROSTER)?;
    std::fs::write(reference_dir.join("formatted_responses.csv"), RESPONSES)?;
    Ok(ReferenceLoader::new(
        reference_dir.join("marking_groups.csv"),
        reference_dir.join("formatted_responses.csv"),
        2,
    ))
}

fn cid(raw: &str) -> CandidateId {
    CandidateId::parse(raw).unwrap()
}

fn qid(raw: &str) -> QuestionId {
    raw.parse().unwrap()
}

/// 完整流程：建立空白 store、選題、評分、儲存、重新讀取
#[tokio::test]
async fn test_first_session_creates_store_and_saves_marks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let loader = write_reference(temp_dir.path())?;
    let store_path = temp_dir.path().join("results").join("scores_VM.csv");

    let reference = loader.load("VM")?;
    assert_eq!(reference.question_ids(), vec![qid("Q12"), qid("Q13")]);
    assert_eq!(reference.candidates.len(), 3);

    let mut session = GradingSession::new(reference, LocalCsvStore::new(&store_path));
    session.start().await?;

    let created = std::fs::read_to_string(&store_path)?;
    assert_eq!(created, "ID,Q12,Q13\n1,-,-\n2,-,-\n3,-,-\n");

    assert_eq!(session.selected_question().unwrap().id, qid("Q12"));
    assert!(session.displayed_marks().all(|(_, mark)| mark == Mark::Unmarked));

    session.edit_mark(&cid("1"), "1.5".parse().unwrap())?;
    session.save().await?;
    assert_eq!(session.phase(), SessionPhase::Saved);

    let saved = std::fs::read_to_string(&store_path)?;
    assert_eq!(saved, "ID,Q12,Q13\n1,1.5,-\n2,-,-\n3,-,-\n");

    let progress = session.progress().await?;
    assert_eq!(progress.remaining_count(), 2);
    assert_eq!(progress.unmarked_for(&qid("Q12")), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_saved_mark_is_seen_by_fresh_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let loader = write_reference(temp_dir.path())?;
    let store_path = temp_dir.path().join("scores_VM.csv");

    let mut first = GradingSession::new(loader.load("VM")?, LocalCsvStore::new(&store_path));
    first.start().await?;
    first.select_question(&qid("Q13")).await?;
    first.edit_mark(&cid("2"), Mark::Points(5))?;
    first.save().await?;

    let mut second = GradingSession::new(loader.load("VM")?, LocalCsvStore::new(&store_path));
    second.start().await?;
    assert_eq!(second.displayed_mark(&cid("2")), Some(Mark::Unmarked));

    second.select_question(&qid("Q13")).await?;
    assert_eq!(second.displayed_mark(&cid("2")), Some(Mark::Points(5)));
    assert_eq!(second.displayed_mark(&cid("1")), Some(Mark::Unmarked));
    Ok(())
}

#[tokio::test]
async fn test_initialize_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = LocalCsvStore::new(temp_dir.path().join("scores.csv"));
    let candidates = vec![cid("1"), cid("2")];
    let questions = vec![qid("Q12")];

    assert!(store.initialize_if_absent(&candidates, &questions).await?);
    let once = std::fs::read_to_string(store.path())?;
    assert!(!store.initialize_if_absent(&candidates, &questions).await?);
    assert_eq!(std::fs::read_to_string(store.path())?, once);

    let mut table = store.read_all().await?;
    table.set(&cid("2"), &qid("Q12"), Mark::Points(1));
    store.write_all(&table).await?;

    assert!(!store.initialize_if_absent(&candidates, &questions).await?);
    assert_eq!(store.read_all().await?.get(&cid("2"), &qid("Q12")), Some(Mark::Points(1)));
    Ok(())
}

#[tokio::test]
async fn test_other_grader_sees_only_their_questions() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let loader = write_reference(temp_dir.path())?;

    let reference = loader.load("JD")?;
    assert_eq!(
        reference.question_ids(),
        vec![qid("Q11"), qid("Q12"), qid("Q13")]
    );

    assert!(matches!(
        loader.load("ZZ"),
        Err(MarkingError::DataIntegrity { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_unreadable_store_keeps_session_state() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let loader = write_reference(temp_dir.path())?;
    let store_path = temp_dir.path().join("scores_VM.csv");

    let mut session = GradingSession::new(loader.load("VM")?, LocalCsvStore::new(&store_path));
    session.start().await?;
    session.edit_mark(&cid("3"), Mark::Points(2))?;

    std::fs::write(&store_path, "garbage without an ID column\n")?;
    let err = session.save().await.unwrap_err();
    assert!(matches!(err, MarkingError::StoreUnavailable { .. }));
    assert!(!err.is_fatal());
    assert!(session.has_unsaved_changes());
    assert_eq!(session.displayed_mark(&cid("3")), Some(Mark::Points(2)));
    Ok(())
}
