use prepquest::db::{BaseMapper, Condition, Handle};
use prepquest_question::infra::{QuestionBankMapperImpl, QuestionMapperImpl};
use prepquest_question::schema::POSTGRES_MIGRATOR;

#[tokio::main]
async fn main() -> prepquest::Result<()> {
    let config = prepquest::config::AppConfig::new(
        prepquest::util::workspace_dir().join("configs"),
    )?;

    prepquest::trace::init(&config.trace)?;
    tracing::debug!("app config: {:?}", config);

    let pool = prepquest::db::connect(&config.database).await?;
    if config.database.migrate {
        POSTGRES_MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| prepquest::Error::Database(e.into()))?;
        tracing::info!("schema migrations applied");
    }

    let mut handle = Handle::Pool(pool);
    let all = Condition::new();
    let questions = QuestionMapperImpl::new().count(&mut handle, &all).await?;
    let banks = QuestionBankMapperImpl::new().count(&mut handle, &all).await?;
    tracing::info!(questions, banks, "question store ready");

    if let Handle::Pool(pool) = handle {
        pool.close().await;
    }
    Ok(())
}
