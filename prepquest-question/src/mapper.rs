use prepquest::db::{BaseMapper, Driver};

use crate::entity::{Question, QuestionBank};

/// Access to the `question` table.
#[async_trait::async_trait]
pub trait QuestionMapper<DB>: BaseMapper<Question, DB>
where
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
}

/// Access to the `question_bank` table.
#[async_trait::async_trait]
pub trait QuestionBankMapper<DB>: BaseMapper<QuestionBank, DB>
where
    DB: Driver,
    for<'e> &'e mut DB::Connection: sqlx::Executor<'e, Database = DB>,
{
}
